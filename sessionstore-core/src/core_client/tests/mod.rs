mod common_ops_tests;

mod build_tests;
mod config_tests;

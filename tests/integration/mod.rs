mod executor_tests;
mod server_tests;

mod logging_tests;

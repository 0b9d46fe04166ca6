mod failpoints_test;

mod binary_test;
mod blocking_test;
mod delete_test;
mod identity_test;
mod insert_test;
mod sources_test;
mod staging_test;

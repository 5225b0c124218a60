mod concurrency_test;
mod unique_index_test;

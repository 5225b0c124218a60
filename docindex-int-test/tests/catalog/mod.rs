mod class_hierarchy_test;
mod index_lifecycle_test;

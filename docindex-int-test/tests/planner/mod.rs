mod collection_index_test;
mod index_selection_test;

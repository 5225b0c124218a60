// index kind names
pub const UNIQUE: &str = "UNIQUE";
pub const NOT_UNIQUE: &str = "NOTUNIQUE";
pub const FULL_TEXT: &str = "FULLTEXT";
pub const DICTIONARY: &str = "DICTIONARY";
pub const PROXY: &str = "PROXY";
pub const HASH_INDEX_SUFFIX: &str = "_HASH_INDEX";

// field spec keywords
pub const BY_KEYWORD: &str = "by";
pub const KEY_KEYWORD: &str = "key";
pub const VALUE_KEYWORD: &str = "value";

// naming
pub const FIELD_SEPARATOR: char = '.';
pub const KEY_SEPARATOR: &str = ", ";
pub const RESERVED_NAME_CHARS: [char; 12] =
    [':', ',', ';', ' ', '%', '@', '=', '(', ')', '[', ']', '`'];

// Compile-time assertion for reserved character count
const _: () = {
    const RESERVED_NAME_CHARS_COUNT: usize = 12;
    const ACTUAL_COUNT: usize = RESERVED_NAME_CHARS.len();
    const _: [(); 1] = [(); (ACTUAL_COUNT == RESERVED_NAME_CHARS_COUNT) as usize];
};

// defaults
pub const MAX_FILTER_BRANCHES: usize = 256;
pub const DEFAULT_PROGRESS_STEP: usize = 1000;
pub const DEFAULT_LATCH_STRIPES: usize = 64;

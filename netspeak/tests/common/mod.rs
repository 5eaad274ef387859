// Shared fixture: a small English index with frequencies chosen so the
// classic query scenarios have stable, hand-checkable answers.

use std::fs;

use netspeak::{Config, Netspeak};

/// Every word occurs as a 1-gram (like in a real corpus); longer phrases
/// carry the frequencies the scenario tests assert on.
pub const FIXTURE: &[(&str, u64)] = &[
    // 1-grams
    ("the", 43_760_129_185),
    ("of", 30_966_074_232),
    ("and", 22_632_024_504),
    ("life", 4_006_784_442),
    ("so", 1_800_281_002),
    ("good", 1_201_565_332),
    ("beautiful", 301_442_007),
    ("following", 251_630_641),
    ("world", 910_110_213),
    ("first", 880_324_051),
    ("same", 850_004_410),
    ("most", 820_447_316),
    ("other", 790_113_220),
    ("new", 760_993_105),
    ("end", 730_485_112),
    ("way", 700_771_400),
    ("united", 401_202_219),
    ("states", 390_112_930),
    ("fast", 170_224_018),
    ("quick", 90_471_233),
    ("color", 50_332_812),
    ("colour", 20_114_305),
    // 2-grams
    ("the following", 240_678_040),
    ("the world", 200_040_133),
    ("the first", 190_221_415),
    ("the same", 180_330_106),
    ("the most", 170_101_923),
    ("the other", 160_415_200),
    ("the new", 150_902_114),
    ("the end", 140_227_309),
    ("the way", 130_700_412),
    ("so good", 5_603_814),
    ("so beautiful", 1_471_556),
    ("so fast", 920_113),
    ("so quick", 410_227),
    // 3-grams
    ("the life of", 16_535_151),
    ("life of the", 9_469_316),
    ("of the life", 3_507_490),
    ("the united states", 91_003_412),
];

pub fn build_index_root() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("index");
    let entries: Vec<(String, u64)> = FIXTURE
        .iter()
        .map(|&(text, freq)| (text.to_string(), freq))
        .collect();
    netspeak::indexing::build_index(entries, &root).unwrap();

    // optional synonym dictionary
    let hash_dir = root.join("hash-dictionary");
    fs::create_dir_all(&hash_dir).unwrap();
    fs::write(hash_dir.join("synonyms.csv"), "fast\tquick\n").unwrap();

    dir
}

pub fn open_engine(dir: &tempfile::TempDir) -> Netspeak {
    let config = Config::for_index_root(&dir.path().join("index"));
    Netspeak::open(&config).unwrap()
}

pub fn engine() -> (tempfile::TempDir, Netspeak) {
    let dir = build_index_root();
    let engine = open_engine(&dir);
    (dir, engine)
}

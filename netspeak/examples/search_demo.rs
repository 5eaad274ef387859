// Builds a throwaway index from a handful of n-grams and runs a few
// queries against it. Run with: cargo run --example search_demo

use netspeak::{Config, Netspeak, SearchRequest};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let counts: Vec<(String, u64)> = [
        ("the", 43_760_129_185u64),
        ("life", 4_006_784_442),
        ("of", 30_966_074_232),
        ("so", 1_800_281_002),
        ("good", 1_201_565_332),
        ("beautiful", 301_442_007),
        ("so good", 5_603_814),
        ("so beautiful", 1_471_556),
        ("the life of", 16_535_151),
        ("life of the", 9_469_316),
        ("of the life", 3_507_490),
    ]
    .into_iter()
    .map(|(text, freq)| (text.to_string(), freq))
    .collect();

    let dir = tempfile::tempdir()?;
    let root = dir.path().join("index");
    netspeak::indexing::build_index(counts, &root)?;

    let engine = Netspeak::open(&Config::for_index_root(&root))?;

    for query in ["the life of", "{ the of life }", "so [ good beautiful ]", "so ?"] {
        println!("query: {}", query);
        let response = engine.search(&SearchRequest::new(query));
        match response.result() {
            Some(result) => {
                for phrase in &result.phrases {
                    println!("  {:>12}  {}", phrase.frequency, phrase.text());
                }
                if !result.unknown_words.is_empty() {
                    println!("  unknown: {:?}", result.unknown_words);
                }
            }
            None => println!("  error: {:?}", response.error()),
        }
    }
    Ok(())
}

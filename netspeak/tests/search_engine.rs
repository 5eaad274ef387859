// End-to-end search scenarios over the fixture index.

mod common;

use netspeak::{ErrorKind, PhraseConstraints, SearchRequest, SearchResponse, WordTag};

fn request(query: &str, max_phrases: u32) -> SearchRequest {
    SearchRequest {
        query: query.to_string(),
        max_phrases,
        phrase_constraints: PhraseConstraints::default(),
    }
}

fn phrase_texts(response: &SearchResponse) -> Vec<(String, u64)> {
    response
        .result()
        .expect("expected a result response")
        .phrases
        .iter()
        .map(|p| (p.text(), p.frequency))
        .collect()
}

#[test]
fn exact_phrase_lookup() {
    let (_dir, engine) = common::engine();
    let response = engine.search(&request("the life of", 100));
    assert_eq!(
        phrase_texts(&response),
        vec![("the life of".to_string(), 16_535_151)]
    );
    assert!(response.result().unwrap().unknown_words.is_empty());
}

#[test]
fn order_set_finds_all_attested_permutations() {
    let (_dir, engine) = common::engine();
    let response = engine.search(&request("{ the of life }", 100));
    assert_eq!(
        phrase_texts(&response),
        vec![
            ("the life of".to_string(), 16_535_151),
            ("life of the".to_string(), 9_469_316),
            ("of the life".to_string(), 3_507_490),
        ]
    );
    let result = response.result().unwrap();
    assert!(result.phrases[0]
        .words
        .iter()
        .all(|w| w.tag == WordTag::WordInOrderset));
}

#[test]
fn option_set_is_ranked_by_frequency() {
    let (_dir, engine) = common::engine();
    let response = engine.search(&request("so [ good beautiful ]", 100));
    assert_eq!(
        phrase_texts(&response),
        vec![
            ("so good".to_string(), 5_603_814),
            ("so beautiful".to_string(), 1_471_556),
        ]
    );
    let result = response.result().unwrap();
    assert_eq!(result.phrases[0].words[0].tag, WordTag::Word);
    assert_eq!(result.phrases[0].words[1].tag, WordTag::WordInOptionset);
}

#[test]
fn star_returns_top_k_across_lengths() {
    let (_dir, engine) = common::engine();
    let response = engine.search(&request("the *", 10));
    let phrases = phrase_texts(&response);
    assert_eq!(phrases.len(), 10);
    assert_eq!(phrases[0], ("the".to_string(), 43_760_129_185));
    assert!(phrases.windows(2).all(|w| w[0].1 >= w[1].1));

    // the 1-gram fills the star with zero words; a 2-gram tags its second
    // word as produced by the star
    let result = response.result().unwrap();
    assert_eq!(result.phrases[0].words[0].tag, WordTag::Word);
    assert_eq!(result.phrases[1].words[1].tag, WordTag::WordForStar);
}

#[test]
fn frequency_cap_skips_the_head_of_the_postlist() {
    let (_dir, engine) = common::engine();
    let mut req = request("the *", 10);
    req.phrase_constraints.frequency_max = 240_678_040;
    let response = engine.search(&req);
    let phrases = phrase_texts(&response);
    assert_eq!(phrases[0], ("the following".to_string(), 240_678_040));
    assert!(phrases.iter().all(|&(_, freq)| freq <= 240_678_040));
}

#[test]
fn qmark_matches_exactly_one_position() {
    let (_dir, engine) = common::engine();
    let response = engine.search(&request("the ? of", 10));
    assert_eq!(
        phrase_texts(&response),
        vec![("the life of".to_string(), 16_535_151)]
    );
    let result = response.result().unwrap();
    assert_eq!(result.phrases[0].words[1].tag, WordTag::WordForQmark);
}

#[test]
fn all_qmark_query_reads_the_corpus_head() {
    let (_dir, engine) = common::engine();
    let response = engine.search(&request("? ?", 3));
    assert_eq!(
        phrase_texts(&response),
        vec![
            ("the following".to_string(), 240_678_040),
            ("the world".to_string(), 200_040_133),
            ("the first".to_string(), 190_221_415),
        ]
    );
}

#[test]
fn unknown_words_are_reported() {
    let (_dir, engine) = common::engine();
    let response = engine.search(&request("_this-word-is-unknown_", 100));
    let result = response.result().unwrap();
    assert!(result.phrases.is_empty());
    assert_eq!(result.unknown_words, vec!["_this-word-is-unknown_"]);
}

#[test]
fn invalid_query_is_an_error_response() {
    let (_dir, engine) = common::engine();
    let response = engine.search(&request("this is invalid [", 100));
    let error = response.error().expect("expected an error response");
    assert_eq!(error.kind, ErrorKind::InvalidQuery);
    assert!(!error.message.is_empty());
}

#[test]
fn too_complex_query_is_rejected() {
    let (_dir, engine) = common::engine();
    let response = engine.search(&request("* * * * * *", 100));
    let error = response.error().expect("expected an error response");
    assert_eq!(error.kind, ErrorKind::InvalidQuery);
    assert!(error.message.contains("too complex"));
}

#[test]
fn regex_token_expands_through_the_vocabulary() {
    let (_dir, engine) = common::engine();
    let response = engine.search(&request("colo[u]r", 10));
    let phrases = phrase_texts(&response);
    assert_eq!(
        phrases,
        vec![
            ("color".to_string(), 50_332_812),
            ("colour".to_string(), 20_114_305),
        ]
    );
    let result = response.result().unwrap();
    assert!(result.phrases.iter().all(|p| p.words[0].tag == WordTag::WordForRegex));
}

#[test]
fn dict_set_expands_synonyms() {
    let (_dir, engine) = common::engine();
    let response = engine.search(&request("so # fast", 10));
    assert_eq!(
        phrase_texts(&response),
        vec![
            ("so fast".to_string(), 920_113),
            ("so quick".to_string(), 410_227),
        ]
    );
    let result = response.result().unwrap();
    assert_eq!(result.phrases[0].words[1].tag, WordTag::WordInDictset);
}

#[test]
fn alternation_unions_clauses() {
    let (_dir, engine) = common::engine();
    let response = engine.search(&request("so good | the life of", 10));
    assert_eq!(
        phrase_texts(&response),
        vec![
            ("the life of".to_string(), 16_535_151),
            ("so good".to_string(), 5_603_814),
        ]
    );
}

#[test]
fn length_constraints_narrow_the_window() {
    let (_dir, engine) = common::engine();
    let mut req = request("the *", 10);
    req.phrase_constraints.words_min = 3;
    let response = engine.search(&req);
    let phrases = phrase_texts(&response);
    assert_eq!(
        phrases,
        vec![
            ("the united states".to_string(), 91_003_412),
            ("the life of".to_string(), 16_535_151),
        ]
    );

    let mut req = request("the *", 10);
    req.phrase_constraints.words_max = 1;
    let response = engine.search(&req);
    assert_eq!(
        phrase_texts(&response),
        vec![("the".to_string(), 43_760_129_185)]
    );
}

#[test]
fn empty_query_is_a_successful_empty_result() {
    let (_dir, engine) = common::engine();
    let response = engine.search(&request("", 100));
    let result = response.result().unwrap();
    assert!(result.phrases.is_empty());
    assert!(result.unknown_words.is_empty());
}

#[test]
fn zero_max_phrases_returns_nothing_but_still_reports_unknowns() {
    let (_dir, engine) = common::engine();
    let response = engine.search(&request("definitely-unknown-word", 0));
    let result = response.result().unwrap();
    assert!(result.phrases.is_empty());
    assert_eq!(result.unknown_words, vec!["definitely-unknown-word"]);
}

#[test]
fn lower_case_option_folds_the_query() {
    let dir = common::build_index_root();

    let mut config = netspeak::Config::for_index_root(&dir.path().join("index"));
    config.query.lower_case = true;
    let engine = netspeak::Netspeak::open(&config).unwrap();
    let response = engine.search(&request("The Life OF", 10));
    assert_eq!(
        phrase_texts(&response),
        vec![("the life of".to_string(), 16_535_151)]
    );

    // without the option the capitalized words are simply unknown
    let plain = common::open_engine(&dir);
    let response = plain.search(&request("The Life OF", 10));
    let result = response.result().unwrap();
    assert!(result.phrases.is_empty());
    assert_eq!(result.unknown_words, vec!["Life", "OF", "The"]);
}

#[test]
fn repeated_searches_are_deterministic() {
    let (_dir, engine) = common::engine();
    let req = request("the *", 10);
    let first = engine.search(&req);
    let second = engine.search(&req);
    assert_eq!(first, second);

    // and identical to a cold engine over the same index
    let dir2 = common::build_index_root();
    let cold = common::open_engine(&dir2);
    assert_eq!(first, cold.search(&req));
}

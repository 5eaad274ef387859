// Phrase corpus tests over a hand-written bin/ directory.

use std::fs;
use std::io::Write;

use netspeak_core::corpus::{entry_size, phrase_file_name, VOCAB_FILE_NAME};
use netspeak_core::{PhraseCorpus, PhraseId};

struct Fixture {
    dir: tempfile::TempDir,
}

impl Fixture {
    // vocab: 0=the 1=life 2=of
    fn new() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(VOCAB_FILE_NAME),
            "the 0\nlife 1\nof 2\n",
        )
        .unwrap();

        // phrases.1: "the" 43, "of" 17
        let mut f = fs::File::create(dir.path().join(phrase_file_name(1))).unwrap();
        for (freq, word) in [(43u64, 0u32), (17, 2)] {
            f.write_all(&freq.to_le_bytes()).unwrap();
            f.write_all(&word.to_le_bytes()).unwrap();
        }

        // phrases.3: "the life of" 16535151
        let mut f = fs::File::create(dir.path().join(phrase_file_name(3))).unwrap();
        f.write_all(&16535151u64.to_le_bytes()).unwrap();
        for word in [0u32, 1, 2] {
            f.write_all(&word.to_le_bytes()).unwrap();
        }

        Fixture { dir }
    }

    fn open(&self) -> PhraseCorpus {
        PhraseCorpus::open(self.dir.path()).unwrap()
    }
}

#[test]
fn counts_and_max_length() {
    let fixture = Fixture::new();
    let corpus = fixture.open();
    assert_eq!(corpus.max_length(), 3);
    assert_eq!(corpus.count_vocabulary(), 3);
    assert_eq!(corpus.count_phrases(1).unwrap(), 2);
    assert_eq!(corpus.count_phrases(2).unwrap(), 0);
    assert_eq!(corpus.count_phrases(3).unwrap(), 1);
}

#[test]
fn record_stride_and_decoding() {
    let fixture = Fixture::new();
    let corpus = fixture.open();

    let phrase = corpus.read_phrase(PhraseId::new(3, 0)).unwrap();
    assert_eq!(phrase.words, vec!["the", "life", "of"]);
    assert_eq!(phrase.frequency, 16535151);

    // the frequency sits at offset local * (8 + 4n) in the raw file
    let raw = fs::read(fixture.dir.path().join(phrase_file_name(1))).unwrap();
    let offset = 1 * entry_size(1);
    let freq = u64::from_le_bytes(raw[offset..offset + 8].try_into().unwrap());
    let phrase = corpus.read_phrase(PhraseId::new(1, 1)).unwrap();
    assert_eq!(phrase.frequency, freq);
    assert_eq!(phrase.words, vec!["of"]);
}

#[test]
fn batched_reads_preserve_request_order() {
    let fixture = Fixture::new();
    let corpus = fixture.open();

    let ids = vec![
        PhraseId::new(3, 0),
        PhraseId::new(1, 1),
        PhraseId::new(1, 0),
        PhraseId::new(3, 0),
    ];
    let phrases = corpus.read_phrases(&ids).unwrap();
    let texts: Vec<String> = phrases.iter().map(|p| p.words.join(" ")).collect();
    assert_eq!(texts, vec!["the life of", "of", "the", "the life of"]);
}

#[test]
fn unknown_word_id_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join(VOCAB_FILE_NAME), "only 0\n").unwrap();
    let mut f = fs::File::create(dir.path().join(phrase_file_name(1))).unwrap();
    f.write_all(&1u64.to_le_bytes()).unwrap();
    f.write_all(&99u32.to_le_bytes()).unwrap();

    let corpus = PhraseCorpus::open(dir.path()).unwrap();
    assert!(corpus.read_phrase(PhraseId::new(1, 0)).is_err());
}

#[test]
fn short_reads_fail_the_whole_call() {
    let fixture = Fixture::new();
    let corpus = fixture.open();
    // local id 5 is past the end of phrases.1
    let ids = vec![PhraseId::new(1, 0), PhraseId::new(1, 5)];
    assert!(corpus.read_phrases(&ids).is_err());
}

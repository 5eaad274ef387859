// Storage engine tests: build a small inverted index on disk, reopen it and
// check heads, slicing, ordering and the open-time guard rails.

use netspeak_core::invertedindex::{
    IndexBuilder, Properties, StorageReader, ValueSorting, PROPERTIES_FILE_NAME,
};
use netspeak_core::{MemoryMode, PhraseRef};

fn sample_index(dir: &std::path::Path) {
    let mut builder: IndexBuilder<PhraseRef> = IndexBuilder::new();
    // postings for three keys, inserted out of order on purpose
    for (id, freq) in [(7u32, 10u64), (1, 500), (3, 40), (9, 40)] {
        builder.insert("2:0_the", PhraseRef { id, freq });
    }
    builder.insert("2:1_life", PhraseRef { id: 1, freq: 500 });
    builder.insert("1:0_of", PhraseRef { id: 0, freq: 77 });
    builder
        .write(dir, ValueSorting::Descending, |values| {
            values.sort_by(|a, b| b.freq.cmp(&a.freq).then(a.id.cmp(&b.id)))
        })
        .unwrap();
}

#[test]
fn heads_and_full_postlists() {
    let dir = tempfile::tempdir().unwrap();
    sample_index(dir.path());

    let reader: StorageReader<PhraseRef> =
        StorageReader::open(dir.path(), MemoryMode::InMemory).unwrap();
    assert_eq!(reader.properties().key_count, 3);
    assert_eq!(reader.properties().value_count, 6);

    let head = reader.read_head("2:0_the").unwrap().unwrap();
    assert_eq!(head.value_count, 4);
    assert_eq!(head.value_size, 12);
    assert_eq!(head.total_size, 48);
    assert!(reader.read_head("2:0_unseen").unwrap().is_none());

    let mut postlist = reader.read_postlist("2:0_the", 0, u32::MAX).unwrap().unwrap();
    let mut values = Vec::new();
    while let Some(value) = postlist.next().unwrap() {
        values.push(value);
    }
    assert_eq!(
        values,
        vec![
            PhraseRef { id: 1, freq: 500 },
            PhraseRef { id: 3, freq: 40 },
            PhraseRef { id: 9, freq: 40 },
            PhraseRef { id: 7, freq: 10 },
        ]
    );

    // frequencies are non-ascending, as the properties promise
    assert_eq!(reader.properties().value_sorting, ValueSorting::Descending);
    assert!(values.windows(2).all(|w| w[0].freq >= w[1].freq));
}

#[test]
fn postlist_slicing() {
    let dir = tempfile::tempdir().unwrap();
    sample_index(dir.path());
    let reader: StorageReader<PhraseRef> =
        StorageReader::open(dir.path(), MemoryMode::InMemory).unwrap();

    let mut slice = reader.read_postlist("2:0_the", 1, 2).unwrap().unwrap();
    assert_eq!(slice.size(), 2);
    assert_eq!(slice.next().unwrap(), Some(PhraseRef { id: 3, freq: 40 }));
    assert_eq!(slice.next().unwrap(), Some(PhraseRef { id: 9, freq: 40 }));
    assert_eq!(slice.next().unwrap(), None);

    // rewind restarts the scoped slice, not the whole postlist
    slice.rewind().unwrap();
    assert_eq!(slice.next().unwrap(), Some(PhraseRef { id: 3, freq: 40 }));

    // a begin beyond the end yields an empty postlist, not an error
    let empty = reader.read_postlist("2:0_the", 100, 10).unwrap().unwrap();
    assert_eq!(empty.size(), 0);
}

#[test]
fn swap_paging_reads_the_same_values() {
    let dir = tempfile::tempdir().unwrap();
    let mut builder: IndexBuilder<PhraseRef> = IndexBuilder::new();
    for i in 0..1000u32 {
        builder.insert(
            "key",
            PhraseRef {
                id: i,
                freq: 1_000_000 - i as u64,
            },
        );
    }
    builder
        .write(dir.path(), ValueSorting::Descending, |values| {
            values.sort_by(|a, b| b.freq.cmp(&a.freq))
        })
        .unwrap();

    // a page far smaller than the payload forces the swap path
    let reader: StorageReader<PhraseRef> =
        StorageReader::open_with_page_size(dir.path(), MemoryMode::InMemory, 100).unwrap();
    let mut postlist = reader.read_postlist("key", 0, u32::MAX).unwrap().unwrap();
    let mut count = 0u32;
    let mut last = u64::MAX;
    while let Some(value) = postlist.next().unwrap() {
        assert!(value.freq <= last);
        last = value.freq;
        count += 1;
    }
    assert_eq!(count, 1000);

    postlist.rewind().unwrap();
    assert_eq!(
        postlist.next().unwrap(),
        Some(PhraseRef {
            id: 0,
            freq: 1_000_000
        })
    );
}

#[test]
fn variable_size_values() {
    let dir = tempfile::tempdir().unwrap();
    let mut builder: IndexBuilder<String> = IndexBuilder::new();
    builder.insert("words", "alpha".to_string());
    builder.insert("words", "be".to_string());
    builder.insert("words", "gammagamma".to_string());
    builder
        .write(dir.path(), ValueSorting::Disabled, |values| values.sort())
        .unwrap();

    let reader: StorageReader<String> =
        StorageReader::open(dir.path(), MemoryMode::InMemory).unwrap();
    let mut postlist = reader.read_postlist("words", 1, u32::MAX).unwrap().unwrap();
    assert_eq!(postlist.next().unwrap().as_deref(), Some("be"));
    assert_eq!(postlist.next().unwrap().as_deref(), Some("gammagamma"));
    assert_eq!(postlist.next().unwrap(), None);
}

#[test]
fn open_rejects_wrong_value_type_and_version() {
    let dir = tempfile::tempdir().unwrap();
    sample_index(dir.path());

    // value type mismatch: the index stores phrase refs
    let result: netspeak_core::Result<StorageReader<String>> =
        StorageReader::open(dir.path(), MemoryMode::InMemory);
    assert!(matches!(
        result,
        Err(netspeak_core::Error::ValueTypeMismatch { .. })
    ));

    // version mismatch: rewrite the properties with a bumped version
    let props_path = dir.path().join(PROPERTIES_FILE_NAME);
    let mut props = Properties::read(&props_path).unwrap();
    props.version_number += 1;
    props.write(&props_path).unwrap();
    let result: netspeak_core::Result<StorageReader<PhraseRef>> =
        StorageReader::open(dir.path(), MemoryMode::InMemory);
    assert!(matches!(
        result,
        Err(netspeak_core::Error::VersionMismatch { .. })
    ));
}

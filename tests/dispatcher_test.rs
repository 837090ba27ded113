//! Dispatcher behavior: registry resolution, phase gating, derived sources.

use tablestream::engine::MemoryEngine;
use tablestream::worker::protocol::{Request, Response};
use tablestream::worker::{DispatchError, Dispatcher};
use tablestream::IngestionPhase;

/// Three columns, fifty data rows, header row first.
fn csv_50_rows() -> Vec<u8> {
    let mut data = String::from("city,country,population\n");
    for i in 0..50 {
        data.push_str(&format!("city{i},country{},{}\n", i % 5, 1000 + i));
    }
    data.into_bytes()
}

/// Cut `bytes` at the given boundaries, which need not align with rows.
fn chunked(bytes: &[u8], cuts: &[usize]) -> Vec<Vec<u8>> {
    let mut chunks = Vec::new();
    let mut start = 0;
    for &cut in cuts {
        chunks.push(bytes[start..cut].to_vec());
        start = cut;
    }
    chunks.push(bytes[start..].to_vec());
    chunks
}

fn ingest(dispatcher: &mut Dispatcher<MemoryEngine>, id: u64, name: &str, chunks: Vec<Vec<u8>>) {
    for (i, chunk) in chunks.into_iter().enumerate() {
        let response = dispatcher
            .handle(Request::IngestChunk {
                id,
                name: name.to_string(),
                chunk,
                header: i == 0,
            })
            .unwrap();
        assert!(matches!(response, Response::Progress { .. }));
    }
    dispatcher.handle(Request::FlushTail { id }).unwrap();
}

/// Ingest and walk the phase machine all the way to Usable.
fn ingest_usable(
    dispatcher: &mut Dispatcher<MemoryEngine>,
    id: u64,
    name: &str,
    chunks: Vec<Vec<u8>>,
) -> Vec<String> {
    ingest(dispatcher, id, name, chunks);
    match dispatcher.handle(Request::FetchHeader { id }).unwrap() {
        Response::Header { names } => names,
        other => panic!("unexpected response: {other:?}"),
    }
}

fn fetch_rows(
    dispatcher: &mut Dispatcher<MemoryEngine>,
    id: u64,
    offset: usize,
    len: usize,
) -> Vec<Vec<String>> {
    match dispatcher
        .handle(Request::FetchChunk { id, offset, len })
        .unwrap()
    {
        Response::Chunk { rows } => rows,
        other => panic!("unexpected response: {other:?}"),
    }
}

#[test]
fn fifty_rows_in_four_arbitrary_chunks() {
    let mut dispatcher = Dispatcher::new(MemoryEngine::new());
    let data = csv_50_rows();
    // Boundaries land mid-row on purpose.
    let chunks = chunked(&data, &[13, 217, 518]);
    assert_eq!(chunks.len(), 4);

    let header = ingest_usable(&mut dispatcher, 0, "cities.csv", chunks);
    assert_eq!(header, vec!["city", "country", "population"]);
    assert_eq!(dispatcher.phase(), IngestionPhase::Usable);

    let page = fetch_rows(&mut dispatcher, 0, 0, 20);
    assert_eq!(page.len(), 20);
    assert_eq!(page[0], vec!["city0", "country0", "1000"]);

    // The last page truncates: rows 40..50, never padded.
    let last = fetch_rows(&mut dispatcher, 0, 40, 20);
    assert_eq!(last.len(), 10);
    assert_eq!(last[9], vec!["city49", "country4", "1049"]);
}

#[test]
fn huge_page_length_truncates_without_overflow() {
    let mut dispatcher = Dispatcher::new(MemoryEngine::new());
    let data = csv_50_rows();
    ingest_usable(&mut dispatcher, 0, "cities.csv", chunked(&data, &[]));

    let rows = fetch_rows(&mut dispatcher, 0, 10, usize::MAX);
    assert_eq!(rows.len(), 40);
    assert_eq!(rows[0], vec!["city10", "country0", "1010"]);
}

#[test]
fn row_set_is_identical_under_rechunking() {
    let data = csv_50_rows();
    let mut all_rows = Vec::new();

    for cuts in [vec![], vec![1, 2, 3], vec![100, 101, 600], vec![313]] {
        let mut dispatcher = Dispatcher::new(MemoryEngine::new());
        ingest_usable(&mut dispatcher, 0, "cities.csv", chunked(&data, &cuts));
        all_rows.push(fetch_rows(&mut dispatcher, 0, 0, 100));
    }

    for rows in &all_rows[1..] {
        assert_eq!(rows, &all_rows[0], "chunk boundaries changed the row set");
    }
    assert_eq!(all_rows[0].len(), 50);
}

#[test]
fn filter_gets_the_next_dense_id_and_resolves_to_the_table() {
    let mut dispatcher = Dispatcher::new(MemoryEngine::new());
    ingest_usable(&mut dispatcher, 0, "cities.csv", vec![csv_50_rows()]);
    assert_eq!(dispatcher.entity_count(), 1);

    let response = dispatcher
        .handle(Request::ApplyFilter {
            id: 0,
            column: "country".to_string(),
            bytes: b"country3".to_vec(),
        })
        .unwrap();

    let (index, names) = match response {
        Response::AddSource { index, names } => (index, names),
        other => panic!("unexpected response: {other:?}"),
    };
    // New id == number of entities registered before the push.
    assert_eq!(index, 1);
    assert_eq!(names, vec!["cities.csv", "cities.csv_country"]);

    // Slicing the derived id reaches the table's physical storage.
    let rows = fetch_rows(&mut dispatcher, index, 0, 100);
    assert_eq!(rows.len(), 10);
    assert!(rows.iter().all(|row| row[1] == "country3"));
}

#[test]
fn two_filters_are_independent_and_leave_the_table_intact() {
    let mut dispatcher = Dispatcher::new(MemoryEngine::new());
    ingest_usable(&mut dispatcher, 0, "cities.csv", vec![csv_50_rows()]);

    let first = dispatcher
        .handle(Request::ApplyFilter {
            id: 0,
            column: "country".to_string(),
            bytes: b"country0".to_vec(),
        })
        .unwrap();
    let second = dispatcher
        .handle(Request::ApplyFilter {
            id: 0,
            column: "country".to_string(),
            bytes: b"country1".to_vec(),
        })
        .unwrap();

    let first_id = match first {
        Response::AddSource { index, .. } => index,
        other => panic!("unexpected response: {other:?}"),
    };
    let second_id = match second {
        Response::AddSource { index, .. } => index,
        other => panic!("unexpected response: {other:?}"),
    };
    assert_ne!(first_id, second_id);
    assert_eq!((first_id, second_id), (1, 2));

    assert_eq!(fetch_rows(&mut dispatcher, first_id, 0, 100).len(), 10);
    assert_eq!(fetch_rows(&mut dispatcher, second_id, 0, 100).len(), 10);
    // The original table still answers with its full row set.
    assert_eq!(fetch_rows(&mut dispatcher, 0, 0, 100).len(), 50);
}

#[test]
fn filter_on_a_derived_id_resolves_transitively() {
    let mut dispatcher = Dispatcher::new(MemoryEngine::new());
    ingest_usable(&mut dispatcher, 0, "cities.csv", vec![csv_50_rows()]);

    let derived = match dispatcher
        .handle(Request::ApplyFilter {
            id: 0,
            column: "country".to_string(),
            bytes: b"country0".to_vec(),
        })
        .unwrap()
    {
        Response::AddSource { index, .. } => index,
        other => panic!("unexpected response: {other:?}"),
    };

    // Deriving from the derived id works: the parent chain ends at table 0.
    let chained = dispatcher
        .handle(Request::ApplyFilter {
            id: derived,
            column: "city".to_string(),
            bytes: b"city5".to_vec(),
        })
        .unwrap();
    let chained_id = match chained {
        Response::AddSource { index, .. } => index,
        other => panic!("unexpected response: {other:?}"),
    };
    let rows = fetch_rows(&mut dispatcher, chained_id, 0, 100);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0][0], "city5");
}

#[test]
fn command_derives_a_named_source() {
    let mut dispatcher = Dispatcher::new(MemoryEngine::new());
    ingest_usable(&mut dispatcher, 0, "cities.csv", vec![csv_50_rows()]);

    let response = dispatcher
        .handle(Request::ApplyCommand {
            id: 0,
            command: "filter country = country2".to_string(),
        })
        .unwrap();

    let (index, names) = match response {
        Response::AddSource { index, names } => (index, names),
        other => panic!("unexpected response: {other:?}"),
    };
    assert_eq!(index, 1);
    assert_eq!(names[1], "cities.csv_filter");
    assert_eq!(fetch_rows(&mut dispatcher, index, 0, 100).len(), 10);
}

#[test]
fn unknown_ids_error_on_reads_but_create_on_ingest() {
    let mut dispatcher = Dispatcher::new(MemoryEngine::new());
    ingest_usable(&mut dispatcher, 0, "cities.csv", vec![csv_50_rows()]);

    let err = dispatcher
        .handle(Request::FetchChunk {
            id: 42,
            offset: 0,
            len: 10,
        })
        .unwrap_err();
    assert!(matches!(err, DispatchError::NotFound(42)));

    let err = dispatcher.handle(Request::FetchHeader { id: 42 }).unwrap_err();
    assert!(matches!(err, DispatchError::NotFound(42)));

    // First ingest message about an id creates its table, even when a table
    // with the same display name already exists.
    let response = dispatcher
        .handle(Request::IngestChunk {
            id: 7,
            name: "cities.csv".to_string(),
            chunk: b"a,b\n1,2\n".to_vec(),
            header: true,
        })
        .unwrap();
    assert!(matches!(response, Response::Progress { progress: 1 }));
    assert_eq!(dispatcher.entity_count(), 2);
    // The two tables share a name but no storage.
    assert_eq!(fetch_rows(&mut dispatcher, 7, 0, 100).len(), 1);
    assert_eq!(fetch_rows(&mut dispatcher, 0, 0, 100).len(), 50);
}

#[test]
fn reads_before_their_phase_are_rejected() {
    let mut dispatcher = Dispatcher::new(MemoryEngine::new());

    // Nothing ingested: flush-tail and fetch-header have no phase to run in.
    let err = dispatcher.handle(Request::FlushTail { id: 0 }).unwrap_err();
    assert!(matches!(
        err,
        DispatchError::PhaseViolation {
            required: IngestionPhase::Waiting,
            actual: IngestionPhase::Empty,
        }
    ));

    ingest(&mut dispatcher, 0, "cities.csv", vec![csv_50_rows()]);

    // Header not yet indexed: fetch-chunk must wait for Usable.
    let err = dispatcher
        .handle(Request::FetchChunk {
            id: 0,
            offset: 0,
            len: 10,
        })
        .unwrap_err();
    assert!(matches!(
        err,
        DispatchError::PhaseViolation {
            required: IngestionPhase::Usable,
            actual: IngestionPhase::HeaderPhase,
        }
    ));

    dispatcher.handle(Request::FetchHeader { id: 0 }).unwrap();
    assert_eq!(fetch_rows(&mut dispatcher, 0, 0, 10).len(), 10);
}

#[test]
fn table_only_operations_reject_derived_ids() {
    let mut dispatcher = Dispatcher::new(MemoryEngine::new());
    ingest_usable(&mut dispatcher, 0, "cities.csv", vec![csv_50_rows()]);
    let derived = match dispatcher
        .handle(Request::ApplyFilter {
            id: 0,
            column: "city".to_string(),
            bytes: b"city1".to_vec(),
        })
        .unwrap()
    {
        Response::AddSource { index, .. } => index,
        other => panic!("unexpected response: {other:?}"),
    };

    let err = dispatcher
        .handle(Request::Distinct {
            id: derived,
            column: "city".to_string(),
        })
        .unwrap_err();
    assert!(matches!(err, DispatchError::NotATable(id) if id == derived));
}

#[test]
fn distinct_and_sum_answer_through_the_column_order() {
    let mut dispatcher = Dispatcher::new(MemoryEngine::new());
    ingest_usable(&mut dispatcher, 0, "cities.csv", vec![csv_50_rows()]);

    match dispatcher
        .handle(Request::Distinct {
            id: 0,
            column: "country".to_string(),
        })
        .unwrap()
    {
        Response::Distinct { values } => {
            assert_eq!(values.len(), 5);
            assert_eq!(values[0], "country0");
        }
        other => panic!("unexpected response: {other:?}"),
    }

    match dispatcher
        .handle(Request::SumColumn {
            id: 0,
            column_name: "population".to_string(),
        })
        .unwrap()
    {
        // 50 rows of 1000 + i for i in 0..50.
        Response::Sum { value } => assert_eq!(value, "51225"),
        other => panic!("unexpected response: {other:?}"),
    }

    let err = dispatcher
        .handle(Request::SumColumn {
            id: 0,
            column_name: "nope".to_string(),
        })
        .unwrap_err();
    assert_eq!(err.code(), "UNKNOWN_COLUMN");
}

#[test]
fn names_list_follows_insertion_order() {
    let mut dispatcher = Dispatcher::new(MemoryEngine::new());
    ingest_usable(&mut dispatcher, 0, "first.csv", vec![csv_50_rows()]);
    ingest(
        &mut dispatcher,
        1,
        "second.csv",
        vec![b"a,b\n1,2\n".to_vec()],
    );
    dispatcher
        .handle(Request::ApplyFilter {
            id: 0,
            column: "city".to_string(),
            bytes: b"city0".to_vec(),
        })
        .unwrap();

    match dispatcher.handle(Request::ListNames).unwrap() {
        Response::Names { names } => {
            assert_eq!(names, vec!["first.csv", "second.csv", "first.csv_city"]);
        }
        other => panic!("unexpected response: {other:?}"),
    }
}

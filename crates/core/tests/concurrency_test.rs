//! Cross-thread behavior: shared handles are Send + Sync, concurrent
//! resolution over one shared cursor stays consistent, and prefetch
//! survives shutdown.

mod common;

use std::thread;

use common::{PdfBuilder, deflate, objstm_payload};
use vellum_core::{Document, Library, Object, ObjectLoader, Reference};

fn assert_send_sync<T: Send + Sync>() {}

#[test]
fn test_shared_types_are_send_and_sync() {
    assert_send_sync::<Document>();
    assert_send_sync::<Library>();
    assert_send_sync::<ObjectLoader>();
}

#[test]
fn test_concurrent_fetch_through_one_container() {
    let bodies: Vec<(u32, String)> = (0..16u32)
        .map(|i| (20 + i, format!("{}", i64::from(i) * 7)))
        .collect();
    let pairs: Vec<(u32, &str)> = bodies.iter().map(|(n, s)| (*n, s.as_str())).collect();
    let (first, payload) = objstm_payload(&pairs);
    let compressed = deflate(&payload);

    let mut b = PdfBuilder::new();
    b.add_object(1, "<< /Type /Catalog /Pages 2 0 R >>");
    b.add_object(2, "<< /Type /Pages /Kids [] /Count 0 >>");
    b.add_stream(
        5,
        &format!(
            "<< /Type /ObjStm /N 16 /First {first} /Filter /FlateDecode /Length {} >>",
            compressed.len()
        ),
        &compressed,
    );
    for i in 0..16u32 {
        b.add_compressed(20 + i, 5, i);
    }
    b.finish_xref_stream(6, "/Root 1 0 R");

    let doc = Document::from_bytes(b.build()).expect("document should open");

    // Every thread races the others into the container on first touch
    thread::scope(|s| {
        for _ in 0..8 {
            s.spawn(|| {
                for i in 0..16u32 {
                    assert_eq!(
                        doc.get(Reference::new(20 + i, 0)),
                        Object::Integer(i64::from(i) * 7)
                    );
                }
                // Regular entries share the same cursor lock
                let pages = doc.get(Reference::new(2, 0));
                assert!(pages.as_dict().is_ok());
            });
        }
    });
}

#[test]
fn test_prefetch_then_shutdown() {
    let mut b = PdfBuilder::new();
    b.add_object(1, "<< /Type /Catalog /Pages 2 0 R >>");
    b.add_object(2, "<< /Type /Pages /Kids [] /Count 0 >>");
    for num in 5..=8u32 {
        b.add_object(num, &format!("{}", num * 10));
    }
    b.finish_classic("/Root 1 0 R");

    let doc = Document::from_bytes(b.build()).expect("document should open");
    let refs: Vec<Reference> = (5..=8).map(|n| Reference::new(n, 0)).collect();

    doc.prefetch(&refs);
    for num in 5..=8u32 {
        assert_eq!(
            doc.get(Reference::new(num, 0)),
            Object::Integer(i64::from(num) * 10)
        );
    }

    doc.shutdown();
    // Jobs submitted after shutdown are dropped; resolution still
    // works inline
    doc.prefetch(&refs);
    assert_eq!(doc.get(Reference::new(5, 0)), Object::Integer(50));
}

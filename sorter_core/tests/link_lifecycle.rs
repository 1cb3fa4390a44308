//! Reader thread lifecycle of `LineLink`.
//!
//! Verifies that:
//! - Lines written by the host arrive in order
//! - Dropping the link after EOF joins the reader thread
//! - Many links can be created and dropped without hanging

use sorter_core::LineLink;
use sorter_traits::HostLink;
use std::io::Cursor;
use std::time::{Duration, Instant};

fn collect<W: std::io::Write>(link: &mut LineLink<W>, want: usize) -> Vec<String> {
    let deadline = Instant::now() + Duration::from_secs(2);
    let mut out = Vec::new();
    while out.len() < want && Instant::now() < deadline {
        match link.poll_line() {
            Some(l) => out.push(l),
            None => std::thread::sleep(Duration::from_millis(1)),
        }
    }
    out
}

#[test]
fn lines_arrive_in_order() {
    let script = (1..=50).map(|i| format!("RES {i} 1\n")).collect::<String>();
    let mut link = LineLink::spawn(Cursor::new(script), std::io::sink());
    let got = collect(&mut link, 50);
    assert_eq!(got.len(), 50);
    assert_eq!(got[0], "RES 1 1");
    assert_eq!(got[49], "RES 50 1");
}

#[test]
fn poll_never_blocks_on_an_idle_reader() {
    // a pipe whose writer stays open: the reader thread blocks in read_line
    let (reader, _writer) = std::io::pipe().unwrap();
    let mut link = LineLink::spawn(std::io::BufReader::new(reader), std::io::sink());
    let t0 = Instant::now();
    assert_eq!(link.poll_line(), None);
    assert!(t0.elapsed() < Duration::from_millis(100));
    assert!(!link.is_closed());
}

#[test]
fn multiple_links_dont_leak_threads() {
    for _ in 0..10 {
        let mut link = LineLink::spawn(Cursor::new("HOME\n"), std::io::sink());
        let _ = collect(&mut link, 1);
        drop(link);
    }
}

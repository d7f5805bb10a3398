//! Tests for the progress stream reader.

use std::time::Duration;

use ff_supervisor::progress::{read_progress, Progress, MAX_PROGRESS_LINE};

#[tokio::test]
async fn reader_handles_lines_split_across_reads() {
    let reader = tokio_test::io::Builder::new()
        .read(b"out_time_us=359")
        .read(b"68000\nspe")
        .read(b"ed=11.9x\nprogress=continue\n")
        .read(b"progress=done\n")
        .build();

    let mut seen = Vec::new();
    read_progress(tokio::io::BufReader::new(reader), |p| seen.push(p))
        .await
        .unwrap();

    assert_eq!(
        seen,
        vec![
            Progress {
                done: false,
                speed: 11.9,
                out_time: Duration::from_micros(35_968_000),
            },
            Progress {
                done: true,
                ..Default::default()
            },
        ]
    );
}

#[tokio::test]
async fn reader_drops_unterminated_record() {
    let input: &[u8] = b"out_time_us=1000\nspeed=1x\nprogress=continue\nout_time_us=2000\n";

    let mut seen = Vec::new();
    read_progress(input, |p| seen.push(p)).await.unwrap();

    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].out_time, Duration::from_micros(1000));
}

#[tokio::test]
async fn reader_propagates_io_errors() {
    let reader = tokio_test::io::Builder::new()
        .read(b"progress=continue\n")
        .read_error(std::io::Error::other("boom"))
        .build();

    let mut count = 0;
    let err = read_progress(tokio::io::BufReader::new(reader), |_| count += 1)
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "boom");
    assert_eq!(count, 1);
}

#[tokio::test]
async fn reader_treats_broken_pipe_as_end() {
    let reader = tokio_test::io::Builder::new()
        .read(b"progress=continue\n")
        .read_error(std::io::Error::from(std::io::ErrorKind::BrokenPipe))
        .build();

    let mut count = 0;
    read_progress(tokio::io::BufReader::new(reader), |_| count += 1)
        .await
        .unwrap();

    assert_eq!(count, 1);
}

#[tokio::test]
async fn reader_skips_invalid_utf8_split_across_reads() {
    let reader = tokio_test::io::Builder::new()
        .read(b"out_time_us=1000000\nprogress=continue\ntitle=\xff")
        .read(b"\xfe\nout_time_us=2000000\n")
        .read(b"progress=done\n")
        .build();

    let mut seen = Vec::new();
    read_progress(tokio::io::BufReader::new(reader), |p| seen.push(p))
        .await
        .unwrap();

    assert_eq!(seen.len(), 2);
    assert_eq!(seen[1].out_time, Duration::from_secs(2));
    assert!(seen[1].done);
}

#[tokio::test]
async fn reader_skips_oversized_line_without_newline_at_end() {
    let mut input = b"progress=continue\n".to_vec();
    input.extend(std::iter::repeat(b'x').take(MAX_PROGRESS_LINE * 3));

    let mut seen = Vec::new();
    read_progress(input.as_slice(), |p| seen.push(p)).await.unwrap();

    assert_eq!(seen.len(), 1);
}

#[tokio::test]
async fn reader_accepts_line_at_length_limit() {
    let prefix = "comment=";
    let mut input = prefix.as_bytes().to_vec();
    input.extend(std::iter::repeat(b'x').take(MAX_PROGRESS_LINE - prefix.len()));
    input.extend_from_slice(b"\nout_time_us=5000000\nprogress=continue\n");

    let mut seen = Vec::new();
    read_progress(input.as_slice(), |p| seen.push(p)).await.unwrap();

    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].out_time, Duration::from_secs(5));
}

//! Codec laws across image shapes

mod common;

use common::*;
use std::sync::Arc;
use stegotriage_core::{
    Classification, Codec, Extraction, FileCodec, Framing, ImageSource, LsbCodec,
    PipelineController, ScanConfig, StegoError,
};

#[test]
fn roundtrip_across_channel_counts() {
    let codec = LsbCodec::default();

    for channels in 1..=4 {
        let cover = random_image(40, 30, channels, channels as u64);
        let max = codec.max_payload_len(&cover);
        let payload = splitmix_bytes(max, 99)
            .into_iter()
            .map(|b| b & 0x7F)
            .filter(|b| *b != b'<')
            .collect::<Vec<_>>();

        let stego = codec.embed(&cover, &payload).unwrap();
        assert_eq!(
            codec.extract(&stego).unwrap(),
            Extraction::Found(payload),
            "channels {}",
            channels
        );
    }
}

#[test]
fn capacity_is_checked_before_mutation() {
    let codec = LsbCodec::default();
    let cover = random_image(10, 10, 3, 1);
    let too_big = vec![b'x'; codec.max_payload_len(&cover) + 1];

    assert!(matches!(
        codec.embed(&cover, &too_big),
        Err(StegoError::CapacityExceeded { .. })
    ));
    // The cover is borrowed immutably; a failed embed leaves nothing behind
    assert_eq!(codec.extract(&cover).unwrap(), Extraction::NotFound);
}

#[test]
fn stego_survives_png_roundtrip() {
    let codec = LsbCodec::default();
    let stego = stego_image(REVERSE_SHELL);

    let png = stegotriage_core::encode_png(&stego).unwrap();
    let (decoded, _) = stegotriage_core::decode_container(&png).unwrap();

    assert_eq!(codec.capacity_bits(&decoded), 256 * 256 * 3);
    assert_eq!(
        codec.extract(&decoded).unwrap().into_payload().unwrap(),
        REVERSE_SHELL
    );
}

#[test]
fn pipeline_runs_with_length_prefixed_codec() {
    let mut payload = REVERSE_SHELL.to_vec();
    payload.extend_from_slice(b"\n# trailer <<END>> kept verbatim\n");

    let codec = FileCodec::with_extension(".py").unwrap();
    let stego = codec.embed(&random_image(256, 256, 3, 7), &payload).unwrap();

    let pipeline = PipelineController::new(&ScanConfig::default())
        .unwrap()
        .with_codec(Arc::new(FileCodec::new()));
    assert_eq!(pipeline.codec().name(), "lsb_length_prefixed");

    let verdict = pipeline.scan(ImageSource::Raw(stego.clone()));
    assert_eq!(verdict.classification(), Classification::Malicious);
    assert_eq!(verdict.payload().unwrap().bytes(), payload.as_slice());

    // Same result when the framing comes from configuration
    let config = ScanConfig {
        framing: Framing::LengthPrefixed,
        ..ScanConfig::default()
    };
    let verdict = PipelineController::new(&config)
        .unwrap()
        .scan(ImageSource::Raw(stego));
    assert_eq!(verdict.payload().unwrap().bytes(), payload.as_slice());
}

#[test]
fn terminator_pipeline_misses_length_prefixed_framing() {
    let codec = FileCodec::new();
    let stego = codec
        .embed(&random_image(256, 256, 3, 7), b"socket connect <<END>> tail")
        .unwrap();

    // The terminator codec stops at the embedded marker and keeps the header
    let verdict = PipelineController::new(&ScanConfig::default())
        .unwrap()
        .scan(ImageSource::Raw(stego));
    let recovered = verdict.payload().unwrap().bytes();
    assert!(recovered.starts_with(b"27:<<HEADER>>"));
    assert!(recovered.ends_with(b"socket connect "));
}

mod common;

use crate::common::{compute_slice_hash, init, MockDecoder, MockDevice};
use bit_vec::BitVec;
use fluxread::{prelude::*, split_file_options, HfeImage};
use proptest::prelude::*;

fn pattern_bits(len_bytes: usize, seed: u8) -> BitVec {
    let bytes: Vec<u8> = (0..len_bytes).map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed)).collect();
    BitVec::from_bytes(&bytes)
}

fn master(len_bytes: usize, seed: u8) -> MasterTrack {
    MasterTrack::from_bitrate(pattern_bits(len_bytes, seed), 250.0)
}

fn u16_at(data: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([data[offset], data[offset + 1]])
}

fn image_with_bitrate(bitrate: &str) -> HfeImage {
    let mut image = HfeImage::new();
    image.set_option("bitrate", bitrate).unwrap();
    image
}

#[test]
fn test_hfe_round_trip() {
    init();
    let mut image = image_with_bitrate("250");
    for c in 0..2 {
        image.emit_track(DiskCh::new(c, 0), ImageTrack::Master(&master(12_500, c as u8))).unwrap();
        image.emit_track(DiskCh::new(c, 1), ImageTrack::Master(&master(12_000, 0x80 + c as u8))).unwrap();
    }

    let data = match image.get_image() {
        Ok(data) => data,
        Err(e) => panic!("Failed to serialize image: {}", e),
    };

    assert_eq!(&data[0..8], b"HXCPICFE");
    assert_eq!(data[9], 2, "cylinder count");
    assert_eq!(data[10], 2, "side count");
    assert_eq!(u16_at(&data, 12), 250, "bitrate");

    // Each cylinder holds 49 interleaved blocks of 512 bytes; the length covers both sides.
    assert_eq!(u16_at(&data, 512), 2);
    assert_eq!(u16_at(&data, 514), 25_000);
    assert_eq!(u16_at(&data, 516), 2 + 49);
    assert_eq!(data.len(), 1024 + 2 * 49 * 512);

    let mut parsed = match HfeImage::from_bytes(&data) {
        Ok(image) => image,
        Err(e) => panic!("Failed to parse image: {}", e),
    };
    assert_eq!(parsed.bitrate(), Some(250));
    assert_eq!(parsed.track_chs().len(), 4);

    let track = parsed.get_track(DiskCh::new(1, 0)).unwrap();
    assert_eq!(track.bits(), &pattern_bits(12_500, 1));
    assert!((track.time_per_rev() - 0.2).abs() < 1e-9);

    // The shorter side comes back padded out to the cylinder's length.
    let track = parsed.get_track(DiskCh::new(0, 1)).unwrap();
    let bytes = track.bits().to_bytes();
    assert_eq!(bytes.len(), 12_500);
    assert_eq!(BitVec::from_bytes(&bytes[..12_000]), pattern_bits(12_000, 0x80));
    assert!(bytes[12_000..].iter().all(|&b| b == 0x11), "0x88 padding, bit reversed");

    let reserialized = parsed.get_image().unwrap();
    assert_eq!(compute_slice_hash(&reserialized), compute_slice_hash(&data));

    let loaded = HfeImage::load(std::io::Cursor::new(data)).unwrap();
    assert_eq!(loaded.cylinders(), 2);
    assert_eq!(loaded.sides(), 2);
}

#[test]
fn test_hfe_dense_cylinder_numbering() {
    init();
    let mut image = image_with_bitrate("250");
    image.emit_track(DiskCh::new(0, 0), ImageTrack::Master(&master(1000, 1))).unwrap();
    image.emit_track(DiskCh::new(2, 0), ImageTrack::Master(&master(1000, 2))).unwrap();

    let data = image.get_image().unwrap();
    assert_eq!(data[9], 3, "cylinder count");
    assert_eq!(data[10], 1, "side count");

    // Cylinder 0: 4 interleaved blocks.
    assert_eq!((u16_at(&data, 512), u16_at(&data, 514)), (2, 2000));
    // Cylinder 1: 25,000 bytes of dummy data, padded to 49 blocks.
    assert_eq!((u16_at(&data, 516), u16_at(&data, 518)), (6, 25_000));
    let dummy = &data[6 * 512..6 * 512 + 25_088];
    assert!(dummy.iter().all(|&b| b == 0x88));
    // Cylinder 2 follows the dummy data.
    assert_eq!((u16_at(&data, 520), u16_at(&data, 522)), (55, 2000));
    assert!(data[512 + 12..1024].iter().all(|&b| b == 0xFF));
    assert_eq!(data.len(), (55 + 4) * 512);
}

#[test]
fn test_hfe_side_count_inference() {
    init();
    let mut image = image_with_bitrate("300");
    image.emit_track(DiskCh::new(0, 0), ImageTrack::Master(&master(500, 1))).unwrap();
    image.emit_track(DiskCh::new(1, 0), ImageTrack::Master(&master(500, 2))).unwrap();
    assert_eq!(image.get_image().unwrap()[10], 1);

    image.emit_track(DiskCh::new(1, 1), ImageTrack::Master(&master(500, 3))).unwrap();
    assert_eq!(image.get_image().unwrap()[10], 2);
}

#[test]
fn test_hfe_splice_rotation() {
    init();
    let mut image = image_with_bitrate("250");
    let bits = BitVec::from_bytes(&[0xF0, 0x00]);
    let track = MasterTrack::from_bitrate(bits, 250.0).with_splice(4);
    image.emit_track(DiskCh::new(0, 0), ImageTrack::Master(&track)).unwrap();

    // The final `splice` bits of the track are moved to the front.
    let stored = image.hfe_track(DiskCh::new(0, 0)).unwrap();
    assert_eq!(stored.bits().to_bytes(), vec![0x0F, 0x00]);
}

#[test]
fn test_hfe_fm_double_rate() {
    init();
    let mut image = HfeImage::new();
    let track = master(1250, 7).with_encoding(TrackDataEncoding::Fm);
    image.emit_track(DiskCh::new(0, 0), ImageTrack::Master(&track)).unwrap();

    let stored = image.hfe_track(DiskCh::new(0, 0)).unwrap();
    assert_eq!(stored.bits().len(), 2 * track.len());
    // A 250 kbit/s track, doubled for FM.
    assert_eq!(image.bitrate(), Some(500));
}

#[test]
fn test_hfe_bitrate_detection() {
    init();
    let mut image = HfeImage::new();
    image.emit_track(DiskCh::new(0, 0), ImageTrack::Master(&master(12_500, 0))).unwrap();
    assert_eq!(image.bitrate(), Some(250));

    // Detection happens once; later tracks do not change the image bitrate.
    let fast = MasterTrack::from_bitrate(pattern_bits(12_500, 0), 500.0);
    image.emit_track(DiskCh::new(1, 0), ImageTrack::Master(&fast)).unwrap();
    assert_eq!(image.bitrate(), Some(250));
}

#[test]
fn test_hfe_empty_image() {
    init();
    let mut image = HfeImage::new();
    let data = image.get_image().unwrap();

    assert_eq!(data[9], 1, "cylinder count");
    assert_eq!(data[10], 1, "side count");
    assert_eq!(u16_at(&data, 12), 250, "default bitrate");
    assert_eq!((u16_at(&data, 512), u16_at(&data, 514)), (2, 25_000));
    assert_eq!(data.len(), 1024 + 25_088);
}

#[test]
fn test_hfe_raw_flux_requires_bitrate() {
    init();
    let mut device = MockDevice::new();
    let flux = device.read_track(2, 0).unwrap();

    let mut image = HfeImage::new();
    match image.emit_track(DiskCh::new(0, 0), ImageTrack::Flux(&flux)) {
        Err(FluxReadError::ConfigError(msg)) => assert!(msg.contains("bitrate=500")),
        _ => panic!("Emitting raw flux without a bitrate should fail"),
    }
}

#[test]
fn test_hfe_raw_flux_sampled_at_bitrate() {
    init();
    let mut device = MockDevice::new();
    let flux = device.read_track(2, 0).unwrap();

    let mut image = image_with_bitrate("250");
    image.emit_track(DiskCh::new(0, 0), ImageTrack::Flux(&flux)).unwrap();

    // One revolution of 200ms at a 2us bitcell.
    let len = image.hfe_track(DiskCh::new(0, 0)).unwrap().bits().len();
    assert!((99_990..=100_010).contains(&len), "revolution was {} bits", len);
}

#[test]
fn test_hfe_decoded_track() {
    init();
    let decoder = MockDecoder::new(Some(1));
    let mut device = MockDevice::new();
    let flux = device.read_track(1, 0).unwrap();
    let track = decoder.decode_track(DiskCh::new(0, 0), &flux, &PllParams::default()).unwrap();

    let mut image = HfeImage::new();
    image.emit_track(DiskCh::new(0, 0), ImageTrack::Decoded(track.as_ref())).unwrap();
    assert_eq!(image.bitrate(), Some(250));
    assert_eq!(image.hfe_track(DiskCh::new(0, 0)).unwrap().bits().len(), 100_000);
}

#[test]
fn test_hfe_rejects_second_head_out_of_range() {
    let mut image = image_with_bitrate("250");
    assert!(image
        .emit_track(DiskCh::new(0, 2), ImageTrack::Master(&master(10, 0)))
        .is_err());
}

#[test]
fn test_hfe_file_options() {
    let (name, opts) = split_file_options("disk.hfe::bitrate=500");
    let format = ImageFormat::from_path(&name).unwrap();
    let mut image = format.new_image();
    opts.apply(&name, image.as_mut()).unwrap();
    assert_eq!(image.get_image().unwrap()[12], 0xF4);

    let (name, opts) = split_file_options("disk.hfe::bitrate=abc");
    match opts.apply(&name, format.new_image().as_mut()) {
        Err(FluxReadError::ConfigError(msg)) => assert_eq!(msg, "HFE: Invalid bitrate: 'abc'"),
        _ => panic!("Invalid bitrate should be rejected"),
    }
}

proptest! {
    #[test]
    fn prop_hfe_bit_order_is_involutive(bytes in proptest::collection::vec(any::<u8>(), 1..512)) {
        let track = fluxread::image::hfe::HfeTrack::new(BitVec::from_bytes(&bytes));
        let restored = fluxread::image::hfe::HfeTrack::from_hfe_bytes(&track.to_hfe_bytes());
        prop_assert_eq!(restored, track);
    }
}

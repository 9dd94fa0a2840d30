//! End-to-end pixel pipeline tests:
//! encapsulated objects in, 8-bit rendered buffers out.
use byteorder::{ByteOrder, LittleEndian};
use medicom_core::dictionary::{tags, uids};
use medicom_core::header::{Length, VR};
use medicom_core::value::Value;
use medicom_object::{DataElement, DataSet, FileMetaTableBuilder, FileObject};
use medicom_pixeldata::render::PixelBuffer;
use medicom_pixeldata::{decode_frame, render_object_frame, RenderOptions};

/// Build an RLE Lossless encapsulated object:
/// 4x4, 8 bits, one frame of a single repeated value per fragment.
fn rle_object(frame_values: &[u8]) -> FileObject {
    let meta = FileMetaTableBuilder::new()
        .media_storage_sop_class_uid(uids::SECONDARY_CAPTURE_IMAGE_STORAGE)
        .media_storage_sop_instance_uid("1.2.3.99")
        .transfer_syntax(uids::RLE_LOSSLESS)
        .build()
        .unwrap();

    let mut ds = DataSet::new();
    ds.put_value(tags::SOP_CLASS_UID, VR::UI, uids::SECONDARY_CAPTURE_IMAGE_STORAGE);
    ds.put_value(tags::SOP_INSTANCE_UID, VR::UI, "1.2.3.99");
    ds.put_value(tags::ROWS, VR::US, 4_u16);
    ds.put_value(tags::COLUMNS, VR::US, 4_u16);
    ds.put_value(tags::BITS_ALLOCATED, VR::US, 8_u16);
    ds.put_value(tags::BITS_STORED, VR::US, 8_u16);
    ds.put_value(tags::HIGH_BIT, VR::US, 7_u16);
    ds.put_value(tags::PIXEL_REPRESENTATION, VR::US, 0_u16);
    ds.put_value(tags::SAMPLES_PER_PIXEL, VR::US, 1_u16);
    ds.put_value(tags::PHOTOMETRIC_INTERPRETATION, VR::CS, "MONOCHROME2");
    ds.put_value(
        tags::NUMBER_OF_FRAMES,
        VR::IS,
        frame_values.len().to_string(),
    );

    let fragments: Vec<Vec<u8>> = frame_values
        .iter()
        .map(|&value| {
            // 64-byte header: 1 segment at offset 64,
            // then a repeat run of 16 bytes
            let mut fragment = vec![0u8; 64];
            LittleEndian::write_u32(&mut fragment[0..4], 1);
            LittleEndian::write_u32(&mut fragment[4..8], 64);
            fragment.extend_from_slice(&[0xF1, value]);
            fragment
        })
        .collect();

    ds.put(DataElement::from_parts(
        medicom_core::header::DataElementHeader::new(tags::PIXEL_DATA, VR::OB, Length::UNDEFINED),
        Value::PixelSequence {
            offset_table: smallvec::smallvec![],
            fragments: fragments.into_iter().collect(),
        },
    ));

    FileObject::new(meta, ds)
}

#[test]
fn rle_frames_decode_per_fragment() {
    let obj = rle_object(&[0xAB, 0x10]);

    let frame0 = decode_frame(&obj, 0).unwrap();
    assert_eq!(frame0, vec![0xAB; 16]);
    let frame1 = decode_frame(&obj, 1).unwrap();
    assert_eq!(frame1, vec![0x10; 16]);

    assert!(decode_frame(&obj, 2).is_err());
}

#[test]
fn rle_object_survives_a_file_round_trip() {
    let obj = rle_object(&[0x42]);
    let mut bytes = Vec::new();
    obj.write_to(&mut bytes).unwrap();
    let back = FileObject::from_reader(&bytes[..]).unwrap();
    assert_eq!(decode_frame(&back, 0).unwrap(), vec![0x42; 16]);
}

#[test]
fn rendering_an_rle_frame_yields_gray8() {
    let obj = rle_object(&[0x80]);
    let image = render_object_frame(&obj, 0, &RenderOptions::default()).unwrap();
    assert_eq!(image.width, 4);
    assert_eq!(image.height, 4);
    match image.pixels {
        PixelBuffer::Gray8(pixels) => {
            assert_eq!(pixels.len(), 16);
            // mid-level input maps near mid-level output
            // under the default full-range window
            assert!(pixels.iter().all(|&p| (120..=136).contains(&p)));
        }
        other => panic!("expected grayscale, got {:?}", other),
    }
}

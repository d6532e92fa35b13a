// tests/codec_compliance.rs - Annex B and RBSP syntax conformance tests
//
// Generated streams are split into NAL units, emulation prevention is removed
// and the parameter sets and slice headers are decoded again with an
// independent reader, so every field can be checked against its configuration.

mod common;

use common::*;
use h264_testgen::*;

struct DecodedSps {
    profile_idc: u64,
    constraint_flags: u64,
    level_idc: u64,
    seq_parameter_set_id: u64,
    log2_max_frame_num_minus4: u64,
    pic_order_cnt_type: u64,
    log2_max_pic_order_cnt_lsb_minus4: Option<u64>,
    offsets_for_ref_frame: Vec<i64>,
    pic_width_in_mbs_minus1: u64,
    pic_height_in_map_units_minus1: u64,
    frame_mbs_only_flag: bool,
    crop: Option<[u64; 4]>,
}

fn decode_sps(rbsp: &[u8]) -> DecodedSps {
    let mut r = BitReader::new(rbsp);
    let profile_idc = r.read_bits(8);
    let constraint_flags = r.read_bits(6);
    assert_eq!(r.read_bits(2), 0, "reserved_zero_2bits");
    let level_idc = r.read_bits(8);
    let seq_parameter_set_id = r.read_ue();
    let log2_max_frame_num_minus4 = r.read_ue();
    let pic_order_cnt_type = r.read_ue();

    let mut log2_max_pic_order_cnt_lsb_minus4 = None;
    let mut offsets_for_ref_frame = Vec::new();
    match pic_order_cnt_type {
        0 => log2_max_pic_order_cnt_lsb_minus4 = Some(r.read_ue()),
        1 => {
            r.read_flag();
            r.read_se();
            r.read_se();
            let cycle = r.read_ue();
            for _ in 0..cycle {
                offsets_for_ref_frame.push(r.read_se());
            }
        }
        _ => {}
    }

    r.read_ue(); // max_num_ref_frames
    r.read_flag(); // gaps_in_frame_num_value_allowed_flag
    let pic_width_in_mbs_minus1 = r.read_ue();
    let pic_height_in_map_units_minus1 = r.read_ue();
    let frame_mbs_only_flag = r.read_flag();
    if !frame_mbs_only_flag {
        r.read_flag();
    }
    r.read_flag(); // direct_8x8_inference_flag
    let crop = if r.read_flag() {
        Some([r.read_ue(), r.read_ue(), r.read_ue(), r.read_ue()])
    } else {
        None
    };
    assert!(!r.read_flag(), "vui_parameters_present_flag");
    assert!(r.at_trailing_bits(), "SPS ends with rbsp_trailing_bits");

    DecodedSps {
        profile_idc,
        constraint_flags,
        level_idc,
        seq_parameter_set_id,
        log2_max_frame_num_minus4,
        pic_order_cnt_type,
        log2_max_pic_order_cnt_lsb_minus4,
        offsets_for_ref_frame,
        pic_width_in_mbs_minus1,
        pic_height_in_map_units_minus1,
        frame_mbs_only_flag,
        crop,
    }
}

fn generate(config: StreamConfig) -> GeneratedStream {
    H264Generator::new(config)
        .expect("Failed to create generator")
        .generate()
        .expect("Failed to generate stream")
}

fn rbsp_units(stream: &GeneratedStream) -> Vec<(u8, u8, Vec<u8>)> {
    split_nal_units(&stream.data)
        .into_iter()
        .map(|nal| {
            let (forbidden, ref_idc, unit_type) = parse_nal_header(nal[0]);
            assert_eq!(forbidden, 0, "forbidden_zero_bit");
            (ref_idc, unit_type, remove_emulation_prevention(&nal[1..]))
        })
        .collect()
}

#[test]
fn test_nal_unit_sequence_and_headers() {
    let config = StreamConfig::new(
        SpsConfig::default(),
        PpsConfig::default(),
        2,
        StartCodeMode::Long,
        vec![
            SliceHeader {
                slice_type: 7,
                is_idr: true,
                ..Default::default()
            },
            SliceHeader {
                slice_type: 5,
                frame_num: 1,
                ..Default::default()
            },
        ],
    )
    .expect("Failed to create config");
    let stream = generate(config);

    let types: Vec<(u8, u8)> = rbsp_units(&stream)
        .iter()
        .map(|(ref_idc, unit_type, _)| (*ref_idc, *unit_type))
        .collect();
    assert_eq!(types, [(2, 7), (2, 8), (2, 5), (2, 1), (2, 11)]);
}

#[test]
fn test_sps_fields_decode() {
    let sps = SpsConfig {
        profile_idc: 100,
        constraint_set_flags: [true, false, true, false, false, true],
        level_idc: 40,
        seq_parameter_set_id: 3,
        pic_order_cnt_type: 0,
        pic_width_in_mbs: 120,
        pic_height_in_map_units: 68,
        frame_cropping_flag: true,
        frame_crop_bottom_offset: 4,
        ..Default::default()
    };
    let slices = vec![SliceHeader {
        slice_type: 2,
        is_idr: true,
        pic_order_cnt_lsb: 40,
        ..Default::default()
    }];
    let config = StreamConfig::new(sps, PpsConfig::default(), 1, StartCodeMode::Long, slices)
        .expect("Failed to create config");
    let stream = generate(config);
    let units = rbsp_units(&stream);

    let decoded = decode_sps(&units[0].2);
    assert_eq!(decoded.profile_idc, 100);
    assert_eq!(decoded.constraint_flags, 0b101001);
    assert_eq!(decoded.level_idc, 40);
    assert_eq!(decoded.seq_parameter_set_id, 3);
    assert_eq!(decoded.log2_max_frame_num_minus4, 0);
    assert_eq!(decoded.pic_order_cnt_type, 0);
    // 40 needs six bits
    assert_eq!(decoded.log2_max_pic_order_cnt_lsb_minus4, Some(2));
    assert_eq!(decoded.pic_width_in_mbs_minus1, 119);
    assert_eq!(decoded.pic_height_in_map_units_minus1, 67);
    assert!(decoded.frame_mbs_only_flag);
    assert_eq!(decoded.crop, Some([0, 0, 0, 4]));
}

#[test]
fn test_sps_pic_order_cnt_cycle() {
    let sps = SpsConfig {
        pic_order_cnt_type: 1,
        num_ref_frames_in_pic_order_cnt_cycle: 3,
        offset_for_ref_frame: -7,
        ..Default::default()
    };
    let config = StreamConfig::new(sps, PpsConfig::default(), 1, StartCodeMode::Long, vec![])
        .expect("Failed to create config");
    let units = rbsp_units(&generate(config));

    let decoded = decode_sps(&units[0].2);
    assert_eq!(decoded.pic_order_cnt_type, 1);
    assert_eq!(decoded.offsets_for_ref_frame, [-7, -7, -7]);
    assert_eq!(decoded.log2_max_pic_order_cnt_lsb_minus4, None);
}

#[test]
fn test_pps_fields_decode() {
    let pps = PpsConfig {
        pic_parameter_set_id: 2,
        seq_parameter_set_id: 1,
        entropy_coding_mode_flag: true,
        weighted_bipred_idc: 2,
        pic_init_qp_minus26: -10,
        pic_init_qs_minus26: 5,
        chroma_qp_index_offset: -12,
        transform_8x8_mode_flag: true,
        second_chroma_qp_index_offset: 4,
        ..Default::default()
    };
    let config = StreamConfig::new(SpsConfig::default(), pps, 1, StartCodeMode::Long, vec![])
        .expect("Failed to create config");
    let units = rbsp_units(&generate(config));

    let mut r = BitReader::new(&units[1].2);
    assert_eq!(r.read_ue(), 2);
    assert_eq!(r.read_ue(), 1);
    assert!(r.read_flag(), "entropy_coding_mode_flag");
    assert!(!r.read_flag());
    assert_eq!(r.read_ue(), 0, "num_slice_groups_minus1");
    assert_eq!(r.read_ue(), 0);
    assert_eq!(r.read_ue(), 0);
    assert!(!r.read_flag());
    assert_eq!(r.read_bits(2), 2, "weighted_bipred_idc");
    assert_eq!(r.read_se(), -10);
    assert_eq!(r.read_se(), 5);
    assert_eq!(r.read_se(), -12);
    assert!(r.read_flag(), "deblocking_filter_control_present_flag");
    assert!(!r.read_flag());
    assert!(!r.read_flag());
    assert!(r.read_flag(), "transform_8x8_mode_flag");
    assert!(!r.read_flag(), "pic_scaling_matrix_present_flag");
    assert_eq!(r.read_se(), 4);
    assert!(r.at_trailing_bits());
}

#[test]
fn test_b_slice_header_decode() {
    let sps = SpsConfig {
        pic_order_cnt_type: 0,
        frame_mbs_only_flag: false,
        ..Default::default()
    };
    let pps = PpsConfig {
        entropy_coding_mode_flag: true,
        ..Default::default()
    };
    let b_slice = SliceHeader {
        slice_type: 6,
        first_mb_in_slice: 2,
        frame_num: 9,
        field_pic_flag: true,
        bottom_field_flag: true,
        pic_order_cnt_lsb: 17,
        direct_spatial_mv_pred_flag: true,
        num_ref_idx_active_override_flag: true,
        num_ref_idx_l0_active_minus1: 1,
        num_ref_idx_l1_active_minus1: 2,
        cabac_init_idc: 2,
        slice_qp_delta: -3,
        disable_deblocking_filter_idc: 1,
        macroblocks_nb: 10,
        ..Default::default()
    };
    let config = StreamConfig::new(sps, pps, 1, StartCodeMode::Long, vec![b_slice])
        .expect("Failed to create config");
    let config_sps = config.sps.clone();
    let units = rbsp_units(&generate(config));
    let (_, unit_type, rbsp) = &units[2];
    assert_eq!(*unit_type, 1);

    let mut r = BitReader::new(rbsp);
    assert_eq!(r.read_ue(), 2, "first_mb_in_slice");
    assert_eq!(r.read_ue(), 6, "slice_type");
    assert_eq!(r.read_ue(), 0, "pic_parameter_set_id");
    assert_eq!(r.read_bits(u32::from(config_sps.frame_num_bits())), 9);
    assert!(r.read_flag(), "field_pic_flag");
    assert!(r.read_flag(), "bottom_field_flag");
    assert_eq!(r.read_bits(u32::from(config_sps.pic_order_cnt_lsb_bits())), 17);
    assert!(r.read_flag(), "direct_spatial_mv_pred_flag");
    assert!(r.read_flag(), "num_ref_idx_active_override_flag");
    assert_eq!(r.read_ue(), 1);
    assert_eq!(r.read_ue(), 2);
    assert!(!r.read_flag(), "ref_pic_list_modification_flag_l0");
    assert!(!r.read_flag(), "ref_pic_list_modification_flag_l1");
    assert!(!r.read_flag(), "adaptive_ref_pic_marking_mode_flag");
    assert_eq!(r.read_ue(), 2, "cabac_init_idc");
    assert_eq!(r.read_se(), -3, "slice_qp_delta");
    assert_eq!(r.read_ue(), 1, "disable_deblocking_filter_idc");
    assert_eq!(r.read_ue(), 10, "mb_skip_run");
    assert!(r.at_trailing_bits());
}

#[test]
fn test_non_reference_idr_omits_marking() {
    let config = StreamConfig::new(
        SpsConfig::default(),
        PpsConfig::default(),
        0,
        StartCodeMode::Long,
        vec![SliceHeader {
            slice_type: 2,
            is_idr: true,
            idr_pic_id: 4,
            macroblocks_nb: 1,
            ..Default::default()
        }],
    )
    .expect("Failed to create config");
    let units = rbsp_units(&generate(config));
    let (ref_idc, _, rbsp) = &units[2];
    assert_eq!(*ref_idc, 0);

    let mut r = BitReader::new(rbsp);
    r.read_ue();
    r.read_ue();
    r.read_ue();
    r.read_bits(4);
    assert_eq!(r.read_ue(), 4, "idr_pic_id");
    // dec_ref_pic_marking absent: slice_qp_delta follows directly
    assert_eq!(r.read_se(), 0);
    assert_eq!(r.read_ue(), 0);
    r.read_se();
    r.read_se();
    assert_eq!(r.read_bits(8), 0x27, "DUMMY_MACROBLOCK");
    assert!(r.at_trailing_bits());
}

#[test]
fn test_no_start_code_emulation_inside_units() {
    let mut rng = TestRng(0xC0FF_EE11);

    for _ in 0..25 {
        let slices: Vec<SliceHeader> = (0..8)
            .map(|i| SliceHeader {
                slice_type: if i == 0 { 2 } else { rng.next() % 3 },
                is_idr: i == 0,
                frame_num: i,
                slice_qp_delta: (rng.next() % 51) as i32 - 25,
                first_mb_in_slice: rng.next() % 4,
                macroblocks_nb: rng.next() % 300,
                ..Default::default()
            })
            .collect();
        let sps = SpsConfig {
            profile_idc: (rng.next() % 4) as u8,
            level_idc: (rng.next() % 4) as u8,
            pic_width_in_mbs: 20,
            pic_height_in_map_units: 15,
            ..Default::default()
        };
        let config = StreamConfig::new(sps, PpsConfig::default(), 1, StartCodeMode::Long, slices)
            .expect("Failed to create config");
        let stream = generate(config);

        let nal_units = split_nal_units(&stream.data);
        assert_eq!(nal_units.len(), stream.units.len());
        for nal in nal_units {
            assert_eq!(find_start_code_emulation(nal), None, "emulated start code in {:02X?}", nal);
        }
    }
}

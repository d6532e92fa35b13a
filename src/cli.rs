// cli.rs - Command line interface
//! Command line definition for the `h264_test_generator` binary.
//!
//! Parameter set fields keep their syntax element names as option names
//! (`--SPS_level_idc 40`, `--PPS_chroma_qp_index_offset=-2`), slices are
//! described with `--slice key=value,...` and may be repeated.
use crate::config::{PpsConfig, SliceHeader, SpsConfig, StreamConfig};
use crate::error::Result;
use crate::nal::StartCodeMode;
use clap::{Args, Parser};
use std::path::PathBuf;

/// Generate H.264 Annex B test bitstreams from explicit syntax element values.
#[derive(Parser, Debug)]
#[command(
    name = "h264_test_generator",
    version,
    about = "Generate H.264 Annex B test bitstreams",
    long_about = r#"
Generate H.264 Annex B test bitstreams from explicit syntax element values.

Examples:
    h264_test_generator -o out.h264 --slice slice_type=2,is_idr=1
    h264_test_generator -o out.h264 -d dump/ --SPS_pic_order_cnt_type 0 \
        --slice slice_type=2,is_idr=1,pic_order_cnt_lsb=0 \
        --slice slice_type=0,frame_num=1,pic_order_cnt_lsb=2
"#
)]
pub struct Cli {
    /// Generated H.264 file path
    #[arg(short = 'o', long = "output")]
    pub output: PathBuf,

    /// Directory receiving per-unit field logs and raw unit bytes
    #[arg(short = 'd', long = "dump-dir")]
    pub dump_dir: Option<PathBuf>,

    /// Slice description, e.g. `slice_type=2,is_idr=1,frame_num=0` (repeatable)
    #[arg(long = "slice", value_parser = parse_slice)]
    pub slices: Vec<SliceHeader>,

    /// nal_ref_idc used for every unit
    #[arg(long = "REF_IDC", default_value_t = 1, value_parser = clap::value_parser!(u8).range(0..=3))]
    pub ref_idc: u8,

    /// Use 3-byte start codes for slice and end-of-stream units
    #[arg(long)]
    pub short_start_codes: bool,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(flatten)]
    pub sps: SpsArgs,

    #[command(flatten)]
    pub pps: PpsArgs,
}

fn parse_slice(s: &str) -> std::result::Result<SliceHeader, String> {
    s.parse().map_err(|e: crate::error::H264GenError| e.to_string())
}

#[derive(Args, Debug)]
pub struct SpsArgs {
    #[arg(long = "SPS_profile_idc", default_value_t = 77)]
    pub profile_idc: u8,
    #[arg(long = "SPS_constraint_set0_flag", default_value_t = 0, value_parser = clap::value_parser!(u8).range(0..=1))]
    pub constraint_set0_flag: u8,
    #[arg(long = "SPS_constraint_set1_flag", default_value_t = 0, value_parser = clap::value_parser!(u8).range(0..=1))]
    pub constraint_set1_flag: u8,
    #[arg(long = "SPS_constraint_set2_flag", default_value_t = 0, value_parser = clap::value_parser!(u8).range(0..=1))]
    pub constraint_set2_flag: u8,
    #[arg(long = "SPS_constraint_set3_flag", default_value_t = 0, value_parser = clap::value_parser!(u8).range(0..=1))]
    pub constraint_set3_flag: u8,
    #[arg(long = "SPS_constraint_set4_flag", default_value_t = 0, value_parser = clap::value_parser!(u8).range(0..=1))]
    pub constraint_set4_flag: u8,
    #[arg(long = "SPS_constraint_set5_flag", default_value_t = 0, value_parser = clap::value_parser!(u8).range(0..=1))]
    pub constraint_set5_flag: u8,
    #[arg(long = "SPS_level_idc", default_value_t = 31)]
    pub level_idc: u8,
    #[arg(long = "SPS_seq_parameter_set_id", default_value_t = 0)]
    pub seq_parameter_set_id: u32,
    /// Sized from the largest slice frame_num when omitted
    #[arg(long = "SPS_log2_max_frame_num_minus4")]
    pub log2_max_frame_num_minus4: Option<u32>,
    #[arg(long = "SPS_pic_order_cnt_type", default_value_t = 2)]
    pub pic_order_cnt_type: u32,
    /// Sized from the largest slice pic_order_cnt_lsb when omitted
    #[arg(long = "SPS_log2_max_pic_order_cnt_lsb_minus4")]
    pub log2_max_pic_order_cnt_lsb_minus4: Option<u32>,
    #[arg(long = "SPS_delta_pic_order_always_zero_flag", default_value_t = 0, value_parser = clap::value_parser!(u8).range(0..=1))]
    pub delta_pic_order_always_zero_flag: u8,
    #[arg(long = "SPS_offset_for_non_ref_pic", default_value_t = 0, allow_negative_numbers = true)]
    pub offset_for_non_ref_pic: i32,
    #[arg(long = "SPS_offset_for_top_to_bottom_field", default_value_t = 0, allow_negative_numbers = true)]
    pub offset_for_top_to_bottom_field: i32,
    #[arg(long = "SPS_num_ref_frames_in_pic_order_cnt_cycle", default_value_t = 0)]
    pub num_ref_frames_in_pic_order_cnt_cycle: u32,
    #[arg(long = "SPS_offset_for_ref_frame", default_value_t = 0, allow_negative_numbers = true)]
    pub offset_for_ref_frame: i32,
    #[arg(long = "SPS_max_num_ref_frames", default_value_t = 0)]
    pub max_num_ref_frames: u32,
    #[arg(long = "SPS_gaps_in_frame_num_value_allowed_flag", default_value_t = 0, value_parser = clap::value_parser!(u8).range(0..=1))]
    pub gaps_in_frame_num_value_allowed_flag: u8,
    #[arg(long = "SPS_pic_width_in_mbs", default_value_t = 6)]
    pub pic_width_in_mbs: u32,
    #[arg(long = "SPS_pic_height_in_map_units", default_value_t = 6)]
    pub pic_height_in_map_units: u32,
    #[arg(long = "SPS_frame_mbs_only_flag", default_value_t = 1, value_parser = clap::value_parser!(u8).range(0..=1))]
    pub frame_mbs_only_flag: u8,
    #[arg(long = "SPS_mb_adaptive_frame_field_flag", default_value_t = 0, value_parser = clap::value_parser!(u8).range(0..=1))]
    pub mb_adaptive_frame_field_flag: u8,
    #[arg(long = "SPS_direct_8x8_inference_flag", default_value_t = 0, value_parser = clap::value_parser!(u8).range(0..=1))]
    pub direct_8x8_inference_flag: u8,
    #[arg(long = "SPS_frame_cropping_flag", default_value_t = 0, value_parser = clap::value_parser!(u8).range(0..=1))]
    pub frame_cropping_flag: u8,
    #[arg(long = "SPS_frame_crop_left_offset", default_value_t = 0)]
    pub frame_crop_left_offset: u32,
    #[arg(long = "SPS_frame_crop_right_offset", default_value_t = 0)]
    pub frame_crop_right_offset: u32,
    #[arg(long = "SPS_frame_crop_top_offset", default_value_t = 0)]
    pub frame_crop_top_offset: u32,
    #[arg(long = "SPS_frame_crop_bottom_offset", default_value_t = 0)]
    pub frame_crop_bottom_offset: u32,
    #[arg(long = "SPS_vui_parameters_present_flag", default_value_t = 0, value_parser = clap::value_parser!(u8).range(0..=1))]
    pub vui_parameters_present_flag: u8,
}

impl From<SpsArgs> for SpsConfig {
    fn from(args: SpsArgs) -> Self {
        Self {
            profile_idc: args.profile_idc,
            constraint_set_flags: [
                args.constraint_set0_flag != 0,
                args.constraint_set1_flag != 0,
                args.constraint_set2_flag != 0,
                args.constraint_set3_flag != 0,
                args.constraint_set4_flag != 0,
                args.constraint_set5_flag != 0,
            ],
            level_idc: args.level_idc,
            seq_parameter_set_id: args.seq_parameter_set_id,
            log2_max_frame_num_minus4: args.log2_max_frame_num_minus4,
            pic_order_cnt_type: args.pic_order_cnt_type,
            log2_max_pic_order_cnt_lsb_minus4: args.log2_max_pic_order_cnt_lsb_minus4,
            delta_pic_order_always_zero_flag: args.delta_pic_order_always_zero_flag != 0,
            offset_for_non_ref_pic: args.offset_for_non_ref_pic,
            offset_for_top_to_bottom_field: args.offset_for_top_to_bottom_field,
            num_ref_frames_in_pic_order_cnt_cycle: args.num_ref_frames_in_pic_order_cnt_cycle,
            offset_for_ref_frame: args.offset_for_ref_frame,
            max_num_ref_frames: args.max_num_ref_frames,
            gaps_in_frame_num_value_allowed_flag: args.gaps_in_frame_num_value_allowed_flag != 0,
            pic_width_in_mbs: args.pic_width_in_mbs,
            pic_height_in_map_units: args.pic_height_in_map_units,
            frame_mbs_only_flag: args.frame_mbs_only_flag != 0,
            mb_adaptive_frame_field_flag: args.mb_adaptive_frame_field_flag != 0,
            direct_8x8_inference_flag: args.direct_8x8_inference_flag != 0,
            frame_cropping_flag: args.frame_cropping_flag != 0,
            frame_crop_left_offset: args.frame_crop_left_offset,
            frame_crop_right_offset: args.frame_crop_right_offset,
            frame_crop_top_offset: args.frame_crop_top_offset,
            frame_crop_bottom_offset: args.frame_crop_bottom_offset,
            vui_parameters_present_flag: args.vui_parameters_present_flag != 0,
        }
    }
}

#[derive(Args, Debug)]
pub struct PpsArgs {
    #[arg(long = "PPS_pic_parameter_set_id", default_value_t = 0)]
    pub pic_parameter_set_id: u32,
    #[arg(id = "PPS_seq_parameter_set_id", long = "PPS_seq_parameter_set_id", default_value_t = 0)]
    pub seq_parameter_set_id: u32,
    #[arg(long = "PPS_entropy_coding_mode_flag", default_value_t = 0, value_parser = clap::value_parser!(u8).range(0..=1))]
    pub entropy_coding_mode_flag: u8,
    #[arg(long = "PPS_bottom_field_pic_order_in_frame_present_flag", default_value_t = 0, value_parser = clap::value_parser!(u8).range(0..=1))]
    pub bottom_field_pic_order_in_frame_present_flag: u8,
    #[arg(long = "PPS_num_slice_groups_minus1", default_value_t = 0)]
    pub num_slice_groups_minus1: u32,
    #[arg(long = "PPS_num_ref_idx_l0_default_active_minus1", default_value_t = 0)]
    pub num_ref_idx_l0_default_active_minus1: u32,
    #[arg(long = "PPS_num_ref_idx_l1_default_active_minus1", default_value_t = 0)]
    pub num_ref_idx_l1_default_active_minus1: u32,
    #[arg(long = "PPS_weighted_pred_flag", default_value_t = 0, value_parser = clap::value_parser!(u8).range(0..=1))]
    pub weighted_pred_flag: u8,
    #[arg(long = "PPS_weighted_bipred_idc", default_value_t = 0)]
    pub weighted_bipred_idc: u8,
    #[arg(long = "PPS_pic_init_qp_minus26", default_value_t = 0, allow_negative_numbers = true)]
    pub pic_init_qp_minus26: i32,
    #[arg(long = "PPS_pic_init_qs_minus26", default_value_t = 0, allow_negative_numbers = true)]
    pub pic_init_qs_minus26: i32,
    #[arg(long = "PPS_chroma_qp_index_offset", default_value_t = 3, allow_negative_numbers = true)]
    pub chroma_qp_index_offset: i32,
    #[arg(long = "PPS_deblocking_filter_control_present_flag", default_value_t = 1, value_parser = clap::value_parser!(u8).range(0..=1))]
    pub deblocking_filter_control_present_flag: u8,
    #[arg(long = "PPS_constrained_intra_pred_flag", default_value_t = 0, value_parser = clap::value_parser!(u8).range(0..=1))]
    pub constrained_intra_pred_flag: u8,
    #[arg(long = "PPS_redundant_pic_cnt_present_flag", default_value_t = 0, value_parser = clap::value_parser!(u8).range(0..=1))]
    pub redundant_pic_cnt_present_flag: u8,
    #[arg(long = "PPS_transform_8x8_mode_flag", default_value_t = 0, value_parser = clap::value_parser!(u8).range(0..=1))]
    pub transform_8x8_mode_flag: u8,
    #[arg(long = "PPS_second_chroma_qp_index_offset", default_value_t = 0, allow_negative_numbers = true)]
    pub second_chroma_qp_index_offset: i32,
}

impl From<PpsArgs> for PpsConfig {
    fn from(args: PpsArgs) -> Self {
        Self {
            pic_parameter_set_id: args.pic_parameter_set_id,
            seq_parameter_set_id: args.seq_parameter_set_id,
            entropy_coding_mode_flag: args.entropy_coding_mode_flag != 0,
            bottom_field_pic_order_in_frame_present_flag: args
                .bottom_field_pic_order_in_frame_present_flag
                != 0,
            num_slice_groups_minus1: args.num_slice_groups_minus1,
            num_ref_idx_l0_default_active_minus1: args.num_ref_idx_l0_default_active_minus1,
            num_ref_idx_l1_default_active_minus1: args.num_ref_idx_l1_default_active_minus1,
            weighted_pred_flag: args.weighted_pred_flag != 0,
            weighted_bipred_idc: args.weighted_bipred_idc,
            pic_init_qp_minus26: args.pic_init_qp_minus26,
            pic_init_qs_minus26: args.pic_init_qs_minus26,
            chroma_qp_index_offset: args.chroma_qp_index_offset,
            deblocking_filter_control_present_flag: args.deblocking_filter_control_present_flag
                != 0,
            constrained_intra_pred_flag: args.constrained_intra_pred_flag != 0,
            redundant_pic_cnt_present_flag: args.redundant_pic_cnt_present_flag != 0,
            transform_8x8_mode_flag: args.transform_8x8_mode_flag != 0,
            second_chroma_qp_index_offset: args.second_chroma_qp_index_offset,
        }
    }
}

impl Cli {
    /// Build the validated stream configuration.
    pub fn into_stream_config(self) -> Result<StreamConfig> {
        let start_code = if self.short_start_codes {
            StartCodeMode::Short
        } else {
            StartCodeMode::Long
        };
        StreamConfig::new(
            self.sps.into(),
            self.pps.into(),
            self.ref_idc,
            start_code,
            self.slices,
        )
    }
}

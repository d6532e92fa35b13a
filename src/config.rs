// config.rs - Stream configuration
//! Immutable parameter set and slice configuration.
//!
//! All values are collected before generation starts; [`StreamConfig::new`]
//! resolves the automatically sized fields and validates the whole set so the
//! generator never has to second-guess its input.
use crate::error::{H264GenError, Result};
use crate::nal::StartCodeMode;
use std::str::FromStr;
use tracing::warn;

/// Upper bound of log2_max_frame_num_minus4 and log2_max_pic_order_cnt_lsb_minus4.
pub const MAX_LOG2_MINUS4: u32 = 12;

/// Largest picture accepted, in macroblocks (MaxFS of the highest H.264 level).
pub const MAX_MACROBLOCKS_PER_PICTURE: u32 = 139_264;

/// Sequence parameter set fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpsConfig {
    pub profile_idc: u8,
    pub constraint_set_flags: [bool; 6],
    pub level_idc: u8,
    pub seq_parameter_set_id: u32,
    /// `None` sizes the field from the largest slice frame_num.
    pub log2_max_frame_num_minus4: Option<u32>,
    pub pic_order_cnt_type: u32,
    /// `None` sizes the field from the largest slice pic_order_cnt_lsb.
    pub log2_max_pic_order_cnt_lsb_minus4: Option<u32>,
    pub delta_pic_order_always_zero_flag: bool,
    pub offset_for_non_ref_pic: i32,
    pub offset_for_top_to_bottom_field: i32,
    pub num_ref_frames_in_pic_order_cnt_cycle: u32,
    /// Written once per entry of the pic order count cycle.
    pub offset_for_ref_frame: i32,
    pub max_num_ref_frames: u32,
    pub gaps_in_frame_num_value_allowed_flag: bool,
    pub pic_width_in_mbs: u32,
    pub pic_height_in_map_units: u32,
    pub frame_mbs_only_flag: bool,
    pub mb_adaptive_frame_field_flag: bool,
    pub direct_8x8_inference_flag: bool,
    pub frame_cropping_flag: bool,
    pub frame_crop_left_offset: u32,
    pub frame_crop_right_offset: u32,
    pub frame_crop_top_offset: u32,
    pub frame_crop_bottom_offset: u32,
    pub vui_parameters_present_flag: bool,
}

impl SpsConfig {
    /// Bit width of slice_header frame_num.
    pub fn frame_num_bits(&self) -> u8 {
        (self.log2_max_frame_num_minus4.unwrap_or(0) + 4) as u8
    }

    /// Bit width of slice_header pic_order_cnt_lsb.
    pub fn pic_order_cnt_lsb_bits(&self) -> u8 {
        (self.log2_max_pic_order_cnt_lsb_minus4.unwrap_or(0) + 4) as u8
    }

    /// Picture height in macroblocks, accounting for field coding.
    pub fn pic_height_in_mbs(&self) -> u32 {
        let fields = if self.frame_mbs_only_flag { 1 } else { 2 };
        self.pic_height_in_map_units * fields
    }

    pub fn macroblocks_per_picture(&self) -> u32 {
        self.pic_width_in_mbs * self.pic_height_in_mbs()
    }

    pub fn validate(&self) -> Result<()> {
        if self.pic_order_cnt_type > 2 {
            return Err(H264GenError::InvalidConfig(format!(
                "pic_order_cnt_type must be 0..=2, got {}",
                self.pic_order_cnt_type
            )));
        }
        for (name, value) in [
            ("log2_max_frame_num_minus4", self.log2_max_frame_num_minus4),
            (
                "log2_max_pic_order_cnt_lsb_minus4",
                self.log2_max_pic_order_cnt_lsb_minus4,
            ),
        ] {
            if value.map_or(false, |v| v > MAX_LOG2_MINUS4) {
                return Err(H264GenError::InvalidConfig(format!(
                    "{} must not exceed {}",
                    name, MAX_LOG2_MINUS4
                )));
            }
        }
        if self.vui_parameters_present_flag {
            return Err(H264GenError::InvalidConfig(
                "VUI parameters are not supported".to_string(),
            ));
        }
        if self.pic_width_in_mbs == 0 || self.pic_height_in_map_units == 0 {
            return Err(H264GenError::InvalidConfig(
                "Picture dimensions must be at least one macroblock".to_string(),
            ));
        }
        match self.macroblocks_per_picture_checked() {
            Some(count) if count <= MAX_MACROBLOCKS_PER_PICTURE => {}
            _ => {
                return Err(H264GenError::InvalidConfig(format!(
                    "Picture of {}x{} map units exceeds {} macroblocks",
                    self.pic_width_in_mbs,
                    self.pic_height_in_map_units,
                    MAX_MACROBLOCKS_PER_PICTURE
                )));
            }
        }
        Ok(())
    }

    fn macroblocks_per_picture_checked(&self) -> Option<u32> {
        let fields = if self.frame_mbs_only_flag { 1 } else { 2 };
        self.pic_height_in_map_units
            .checked_mul(fields)?
            .checked_mul(self.pic_width_in_mbs)
    }
}

impl Default for SpsConfig {
    fn default() -> Self {
        Self {
            profile_idc: 77,
            constraint_set_flags: [false; 6],
            level_idc: 31,
            seq_parameter_set_id: 0,
            log2_max_frame_num_minus4: None,
            pic_order_cnt_type: 2,
            log2_max_pic_order_cnt_lsb_minus4: None,
            delta_pic_order_always_zero_flag: false,
            offset_for_non_ref_pic: 0,
            offset_for_top_to_bottom_field: 0,
            num_ref_frames_in_pic_order_cnt_cycle: 0,
            offset_for_ref_frame: 0,
            max_num_ref_frames: 0,
            gaps_in_frame_num_value_allowed_flag: false,
            pic_width_in_mbs: 6,
            pic_height_in_map_units: 6,
            frame_mbs_only_flag: true,
            mb_adaptive_frame_field_flag: false,
            direct_8x8_inference_flag: false,
            frame_cropping_flag: false,
            frame_crop_left_offset: 0,
            frame_crop_right_offset: 0,
            frame_crop_top_offset: 0,
            frame_crop_bottom_offset: 0,
            vui_parameters_present_flag: false,
        }
    }
}

/// Picture parameter set fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PpsConfig {
    pub pic_parameter_set_id: u32,
    pub seq_parameter_set_id: u32,
    pub entropy_coding_mode_flag: bool,
    pub bottom_field_pic_order_in_frame_present_flag: bool,
    pub num_slice_groups_minus1: u32,
    pub num_ref_idx_l0_default_active_minus1: u32,
    pub num_ref_idx_l1_default_active_minus1: u32,
    pub weighted_pred_flag: bool,
    pub weighted_bipred_idc: u8,
    pub pic_init_qp_minus26: i32,
    pub pic_init_qs_minus26: i32,
    pub chroma_qp_index_offset: i32,
    pub deblocking_filter_control_present_flag: bool,
    pub constrained_intra_pred_flag: bool,
    pub redundant_pic_cnt_present_flag: bool,
    pub transform_8x8_mode_flag: bool,
    pub second_chroma_qp_index_offset: i32,
}

impl PpsConfig {
    pub fn validate(&self) -> Result<()> {
        if self.num_slice_groups_minus1 != 0 {
            return Err(H264GenError::InvalidConfig(
                "Slice groups are not supported, num_slice_groups_minus1 must be 0".to_string(),
            ));
        }
        if self.weighted_bipred_idc > 2 {
            return Err(H264GenError::InvalidConfig(format!(
                "weighted_bipred_idc must be 0..=2, got {}",
                self.weighted_bipred_idc
            )));
        }
        Ok(())
    }
}

impl Default for PpsConfig {
    fn default() -> Self {
        Self {
            pic_parameter_set_id: 0,
            seq_parameter_set_id: 0,
            entropy_coding_mode_flag: false,
            bottom_field_pic_order_in_frame_present_flag: false,
            num_slice_groups_minus1: 0,
            num_ref_idx_l0_default_active_minus1: 0,
            num_ref_idx_l1_default_active_minus1: 0,
            weighted_pred_flag: false,
            weighted_bipred_idc: 0,
            pic_init_qp_minus26: 0,
            pic_init_qs_minus26: 0,
            chroma_qp_index_offset: 3,
            deblocking_filter_control_present_flag: true,
            constrained_intra_pred_flag: false,
            redundant_pic_cnt_present_flag: false,
            transform_8x8_mode_flag: false,
            second_chroma_qp_index_offset: 0,
        }
    }
}

/// Slice type after the `% 5` reduction applied to slice_type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SliceKind {
    P,
    B,
    I,
    Sp,
    Si,
}

impl SliceKind {
    pub fn from_slice_type(slice_type: u32) -> Self {
        match slice_type % 5 {
            0 => SliceKind::P,
            1 => SliceKind::B,
            2 => SliceKind::I,
            3 => SliceKind::Sp,
            _ => SliceKind::Si,
        }
    }

    pub fn is_intra(self) -> bool {
        matches!(self, SliceKind::I | SliceKind::Si)
    }
}

/// Per-slice header values, parsed from `key=value` sub-options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SliceHeader {
    pub slice_type: u32,
    pub first_mb_in_slice: u32,
    pub pic_parameter_set_id: u32,
    pub frame_num: u32,
    pub is_idr: bool,
    pub idr_pic_id: u32,
    pub field_pic_flag: bool,
    pub bottom_field_flag: bool,
    pub no_output_of_prior_pics_flag: bool,
    pub long_term_reference_flag: bool,
    pub cabac_init_idc: u32,
    pub slice_qp_delta: i32,
    pub disable_deblocking_filter_idc: u32,
    pub slice_alpha_c0_offset_div2: i32,
    pub slice_beta_offset_div2: i32,
    pub num_ref_idx_active_override_flag: bool,
    pub num_ref_idx_l0_active_minus1: u32,
    pub num_ref_idx_l1_active_minus1: u32,
    pub direct_spatial_mv_pred_flag: bool,
    pub pic_order_cnt_lsb: u32,
    /// 0 covers the whole picture.
    pub macroblocks_nb: u32,
}

impl SliceHeader {
    pub fn kind(&self) -> SliceKind {
        SliceKind::from_slice_type(self.slice_type)
    }
}

impl FromStr for SliceHeader {
    type Err = H264GenError;

    fn from_str(s: &str) -> Result<Self> {
        let mut sh = SliceHeader::default();

        for pair in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (key, value) = pair.split_once('=').ok_or_else(|| {
                H264GenError::InvalidSliceParam(format!("'{}' has no value", pair))
            })?;
            let (key, value) = (key.trim(), value.trim());

            match key {
                "slice_type" => sh.slice_type = parse_number(key, value)?,
                "first_mb_in_slice" => sh.first_mb_in_slice = parse_number(key, value)?,
                "pic_parameter_set_id" => sh.pic_parameter_set_id = parse_number(key, value)?,
                "frame_num" => sh.frame_num = parse_number(key, value)?,
                "is_idr" => sh.is_idr = parse_flag(key, value)?,
                "idr_pic_id" => sh.idr_pic_id = parse_number(key, value)?,
                "field_pic_flag" => sh.field_pic_flag = parse_flag(key, value)?,
                "bottom_field_flag" => sh.bottom_field_flag = parse_flag(key, value)?,
                "no_output_of_prior_pics_flag" => {
                    sh.no_output_of_prior_pics_flag = parse_flag(key, value)?
                }
                "long_term_reference_flag" => {
                    sh.long_term_reference_flag = parse_flag(key, value)?
                }
                "cabac_init_idc" => sh.cabac_init_idc = parse_number(key, value)?,
                "slice_qp_delta" => sh.slice_qp_delta = parse_number(key, value)?,
                "disable_deblocking_filter_idc" => {
                    sh.disable_deblocking_filter_idc = parse_number(key, value)?
                }
                "slice_alpha_c0_offset_div2" => {
                    sh.slice_alpha_c0_offset_div2 = parse_number(key, value)?
                }
                "slice_beta_offset_div2" => sh.slice_beta_offset_div2 = parse_number(key, value)?,
                "num_ref_idx_active_override_flag" => {
                    sh.num_ref_idx_active_override_flag = parse_flag(key, value)?
                }
                "num_ref_idx_l0_active_minus1" => {
                    sh.num_ref_idx_l0_active_minus1 = parse_number(key, value)?
                }
                "num_ref_idx_l1_active_minus1" => {
                    sh.num_ref_idx_l1_active_minus1 = parse_number(key, value)?
                }
                "direct_spatial_mv_pred_flag" => {
                    sh.direct_spatial_mv_pred_flag = parse_flag(key, value)?
                }
                "pic_order_cnt_lsb" => sh.pic_order_cnt_lsb = parse_number(key, value)?,
                "macroblocks_nb" => sh.macroblocks_nb = parse_number(key, value)?,
                _ => warn!(suboption = pair, "unknown slice suboption, ignoring"),
            }
        }

        Ok(sh)
    }
}

fn parse_number<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value.parse().map_err(|_| {
        H264GenError::InvalidSliceParam(format!("{} has invalid value '{}'", key, value))
    })
}

/// Accepts `0` or `1`.
pub fn parse_flag(key: &str, value: &str) -> Result<bool> {
    match value {
        "0" => Ok(false),
        "1" => Ok(true),
        _ => Err(H264GenError::InvalidSliceParam(format!(
            "{} must be 0 or 1, got '{}'",
            key, value
        ))),
    }
}

/// Everything needed to generate one stream, validated and with all
/// automatically sized fields resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamConfig {
    pub sps: SpsConfig,
    pub pps: PpsConfig,
    pub ref_idc: u8,
    pub start_code: StartCodeMode,
    pub slices: Vec<SliceHeader>,
}

impl StreamConfig {
    pub fn new(
        sps: SpsConfig,
        pps: PpsConfig,
        ref_idc: u8,
        start_code: StartCodeMode,
        slices: Vec<SliceHeader>,
    ) -> Result<Self> {
        let mut config = Self {
            sps,
            pps,
            ref_idc,
            start_code,
            slices,
        };
        config.resolve_field_sizes();
        config.validate()?;
        Ok(config)
    }

    fn resolve_field_sizes(&mut self) {
        let max_frame_num = self.slices.iter().map(|sh| sh.frame_num).max().unwrap_or(0);
        let max_poc_lsb = self
            .slices
            .iter()
            .map(|sh| sh.pic_order_cnt_lsb)
            .max()
            .unwrap_or(0);

        if self.sps.log2_max_frame_num_minus4.is_none() {
            self.sps.log2_max_frame_num_minus4 = Some(log2_minus4_for(max_frame_num));
        }
        if self.sps.log2_max_pic_order_cnt_lsb_minus4.is_none() {
            self.sps.log2_max_pic_order_cnt_lsb_minus4 = Some(log2_minus4_for(max_poc_lsb));
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.ref_idc > 3 {
            return Err(H264GenError::InvalidConfig(format!(
                "nal_ref_idc must be 0..=3, got {}",
                self.ref_idc
            )));
        }
        self.sps.validate()?;
        self.pps.validate()?;

        for (index, sh) in self.slices.iter().enumerate() {
            self.validate_slice(index, sh)?;
        }
        Ok(())
    }

    fn validate_slice(&self, index: usize, sh: &SliceHeader) -> Result<()> {
        let kind = sh.kind();
        if matches!(kind, SliceKind::Sp | SliceKind::Si) {
            return Err(H264GenError::UnsupportedSliceType(sh.slice_type));
        }
        if sh.is_idr && kind != SliceKind::I {
            return Err(H264GenError::UnsupportedSliceType(sh.slice_type));
        }

        let frame_num_bits = self.sps.frame_num_bits();
        if u64::from(sh.frame_num) >= 1u64 << frame_num_bits {
            return Err(H264GenError::InvalidConfig(format!(
                "slice {}: frame_num {} does not fit in {} bits",
                index, sh.frame_num, frame_num_bits
            )));
        }

        let picture_macroblocks = self.sps.macroblocks_per_picture();
        if sh.macroblocks_nb > picture_macroblocks {
            return Err(H264GenError::InvalidConfig(format!(
                "slice {}: macroblocks_nb {} exceeds the {} macroblocks of the picture",
                index, sh.macroblocks_nb, picture_macroblocks
            )));
        }

        let poc_bits = self.sps.pic_order_cnt_lsb_bits();
        if self.sps.pic_order_cnt_type == 0 && u64::from(sh.pic_order_cnt_lsb) >= 1u64 << poc_bits
        {
            return Err(H264GenError::InvalidConfig(format!(
                "slice {}: pic_order_cnt_lsb {} does not fit in {} bits",
                index, sh.pic_order_cnt_lsb, poc_bits
            )));
        }

        Ok(())
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        let mut config = Self {
            sps: SpsConfig::default(),
            pps: PpsConfig::default(),
            ref_idc: 1,
            start_code: StartCodeMode::Long,
            slices: Vec::new(),
        };
        config.resolve_field_sizes();
        config
    }
}

/// Smallest `log2_max_*_minus4` whose field holds `max_value`.
pub fn log2_minus4_for(max_value: u32) -> u32 {
    (28 - max_value.leading_zeros() as i32).max(0) as u32
}

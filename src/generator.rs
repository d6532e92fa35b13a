// generator.rs - H.264 Annex B test stream generator
use crate::bitstream::BitstreamWriter;
use crate::config::{SliceHeader, SliceKind, StreamConfig};
use crate::error::Result;
use crate::nal::{write_nal_header, NalUnitType};
use crate::syntax::{write_elements, SyntaxElement};
use std::time::Instant;
use tracing::{debug, info};

/// Payload written for every macroblock of an I slice.
pub const DUMMY_MACROBLOCK: u32 = 0x27;

const CONSTRAINT_SET_NAMES: [&str; 6] = [
    "constraint_set0_flag",
    "constraint_set1_flag",
    "constraint_set2_flag",
    "constraint_set3_flag",
    "constraint_set4_flag",
    "constraint_set5_flag",
];

/// Where one NAL unit landed in the stream and what went into it.
#[derive(Debug, Clone)]
pub struct UnitReport {
    pub name: String,
    pub unit_type: NalUnitType,
    pub offset: usize,
    pub length: usize,
    pub elements: Vec<SyntaxElement>,
}

impl UnitReport {
    /// One `name = value` line per written syntax element, repeated elements
    /// once per occurrence, closed by the stop bit of units with trailing bits.
    pub fn field_log(&self) -> String {
        let mut log = String::new();
        for element in &self.elements {
            let line = format!("{}\n", element);
            for _ in 0..element.count() {
                log.push_str(&line);
            }
        }
        if self.unit_type != NalUnitType::EndOfStream {
            log.push_str("stop_bit = 1\n");
        }
        log
    }
}

#[derive(Debug, Default, Clone)]
pub struct StreamStats {
    pub units_written: usize,
    pub total_bytes: usize,
    pub escape_bytes: usize,
    pub generation_time_us: u64,
}

#[derive(Debug, Clone)]
pub struct GeneratedStream {
    pub data: Vec<u8>,
    pub units: Vec<UnitReport>,
    pub stats: StreamStats,
}

impl GeneratedStream {
    pub fn unit_data(&self, unit: &UnitReport) -> &[u8] {
        &self.data[unit.offset..unit.offset + unit.length]
    }

    pub fn unit(&self, name: &str) -> Option<&UnitReport> {
        self.units.iter().find(|unit| unit.name == name)
    }
}

pub struct H264Generator {
    config: StreamConfig,
}

impl H264Generator {
    pub fn new(config: StreamConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn get_config(&self) -> &StreamConfig {
        &self.config
    }

    /// SPS, PPS, one NAL per slice, then end of stream.
    pub fn generate(&self) -> Result<GeneratedStream> {
        let start_time = Instant::now();
        let mut writer = BitstreamWriter::new();
        let mut units = Vec::with_capacity(self.config.slices.len() + 3);

        units.push(self.write_unit(&mut writer, "SPS", NalUnitType::Sps, self.sps_elements())?);
        units.push(self.write_unit(&mut writer, "PPS", NalUnitType::Pps, self.pps_elements())?);

        for (index, sh) in self.config.slices.iter().enumerate() {
            let unit_type = if sh.is_idr {
                NalUnitType::IdrSlice
            } else {
                NalUnitType::NonIdrSlice
            };
            let elements = self.slice_elements(sh);
            units.push(self.write_unit(&mut writer, &format!("slice_{}", index), unit_type, elements)?);
        }

        units.push(self.write_unit(
            &mut writer,
            "end_of_stream",
            NalUnitType::EndOfStream,
            Vec::new(),
        )?);

        let escape_bytes = writer.escape_count();
        let data = writer.finish()?;

        let stats = StreamStats {
            units_written: units.len(),
            total_bytes: data.len(),
            escape_bytes,
            generation_time_us: start_time.elapsed().as_micros() as u64,
        };
        info!(
            units = stats.units_written,
            bytes = stats.total_bytes,
            escapes = stats.escape_bytes,
            "generated H.264 stream"
        );

        Ok(GeneratedStream { data, units, stats })
    }

    fn write_unit(
        &self,
        writer: &mut BitstreamWriter,
        name: &str,
        unit_type: NalUnitType,
        elements: Vec<SyntaxElement>,
    ) -> Result<UnitReport> {
        writer.byte_align()?;
        let offset = writer.finalized_len();
        write_nal_header(writer, self.config.start_code, self.config.ref_idc, unit_type)?;

        write_elements(writer, &elements)?;
        if unit_type != NalUnitType::EndOfStream {
            writer.write_trailing_bits()?;
        }

        let length = writer.finalized_len() - offset;
        debug!(unit = name, offset, length, elements = elements.len(), "wrote NAL unit");

        Ok(UnitReport {
            name: name.to_string(),
            unit_type,
            offset,
            length,
            elements,
        })
    }

    pub fn sps_elements(&self) -> Vec<SyntaxElement> {
        let sps = &self.config.sps;
        let mut fields = vec![SyntaxElement::fixed("profile_idc", u32::from(sps.profile_idc), 8)];

        for (&name, &set) in CONSTRAINT_SET_NAMES.iter().zip(sps.constraint_set_flags.iter()) {
            fields.push(SyntaxElement::flag(name, set));
        }

        fields.extend([
            SyntaxElement::fixed("reserved_zero_2bits", 0, 2),
            SyntaxElement::fixed("level_idc", u32::from(sps.level_idc), 8),
            SyntaxElement::ue("seq_parameter_set_id", sps.seq_parameter_set_id),
            SyntaxElement::ue(
                "log2_max_frame_num_minus4",
                sps.log2_max_frame_num_minus4.unwrap_or(0),
            ),
            SyntaxElement::ue("pic_order_cnt_type", sps.pic_order_cnt_type),
        ]);

        match sps.pic_order_cnt_type {
            0 => fields.push(SyntaxElement::ue(
                "log2_max_pic_order_cnt_lsb_minus4",
                sps.log2_max_pic_order_cnt_lsb_minus4.unwrap_or(0),
            )),
            1 => {
                fields.extend([
                    SyntaxElement::flag(
                        "delta_pic_order_always_zero_flag",
                        sps.delta_pic_order_always_zero_flag,
                    ),
                    SyntaxElement::se("offset_for_non_ref_pic", sps.offset_for_non_ref_pic),
                    SyntaxElement::se(
                        "offset_for_top_to_bottom_field",
                        sps.offset_for_top_to_bottom_field,
                    ),
                    SyntaxElement::ue(
                        "num_ref_frames_in_pic_order_cnt_cycle",
                        sps.num_ref_frames_in_pic_order_cnt_cycle,
                    ),
                ]);
                for _ in 0..sps.num_ref_frames_in_pic_order_cnt_cycle {
                    fields.push(SyntaxElement::se("offset_for_ref_frame", sps.offset_for_ref_frame));
                }
            }
            _ => {}
        }

        fields.extend([
            SyntaxElement::ue("max_num_ref_frames", sps.max_num_ref_frames),
            SyntaxElement::flag(
                "gaps_in_frame_num_value_allowed_flag",
                sps.gaps_in_frame_num_value_allowed_flag,
            ),
            SyntaxElement::ue("pic_width_in_mbs_minus1", sps.pic_width_in_mbs - 1),
            SyntaxElement::ue("pic_height_in_map_units_minus1", sps.pic_height_in_map_units - 1),
            SyntaxElement::flag("frame_mbs_only_flag", sps.frame_mbs_only_flag),
        ]);

        if !sps.frame_mbs_only_flag {
            fields.push(SyntaxElement::flag(
                "mb_adaptive_frame_field_flag",
                sps.mb_adaptive_frame_field_flag,
            ));
        }

        fields.push(SyntaxElement::flag(
            "direct_8x8_inference_flag",
            sps.direct_8x8_inference_flag,
        ));
        fields.push(SyntaxElement::flag("frame_cropping_flag", sps.frame_cropping_flag));

        if sps.frame_cropping_flag {
            fields.extend([
                SyntaxElement::ue("frame_crop_left_offset", sps.frame_crop_left_offset),
                SyntaxElement::ue("frame_crop_right_offset", sps.frame_crop_right_offset),
                SyntaxElement::ue("frame_crop_top_offset", sps.frame_crop_top_offset),
                SyntaxElement::ue("frame_crop_bottom_offset", sps.frame_crop_bottom_offset),
            ]);
        }

        fields.push(SyntaxElement::flag(
            "vui_parameters_present_flag",
            sps.vui_parameters_present_flag,
        ));
        fields
    }

    pub fn pps_elements(&self) -> Vec<SyntaxElement> {
        let pps = &self.config.pps;
        let mut fields = vec![
            SyntaxElement::ue("pic_parameter_set_id", pps.pic_parameter_set_id),
            SyntaxElement::ue("seq_parameter_set_id", pps.seq_parameter_set_id),
            SyntaxElement::flag("entropy_coding_mode_flag", pps.entropy_coding_mode_flag),
            SyntaxElement::flag(
                "bottom_field_pic_order_in_frame_present_flag",
                pps.bottom_field_pic_order_in_frame_present_flag,
            ),
            SyntaxElement::ue("num_slice_groups_minus1", pps.num_slice_groups_minus1),
            SyntaxElement::ue(
                "num_ref_idx_l0_default_active_minus1",
                pps.num_ref_idx_l0_default_active_minus1,
            ),
            SyntaxElement::ue(
                "num_ref_idx_l1_default_active_minus1",
                pps.num_ref_idx_l1_default_active_minus1,
            ),
            SyntaxElement::flag("weighted_pred_flag", pps.weighted_pred_flag),
            SyntaxElement::fixed("weighted_bipred_idc", u32::from(pps.weighted_bipred_idc), 2),
            SyntaxElement::se("pic_init_qp_minus26", pps.pic_init_qp_minus26),
            SyntaxElement::se("pic_init_qs_minus26", pps.pic_init_qs_minus26),
            SyntaxElement::se("chroma_qp_index_offset", pps.chroma_qp_index_offset),
            SyntaxElement::flag(
                "deblocking_filter_control_present_flag",
                pps.deblocking_filter_control_present_flag,
            ),
            SyntaxElement::flag("constrained_intra_pred_flag", pps.constrained_intra_pred_flag),
            SyntaxElement::flag(
                "redundant_pic_cnt_present_flag",
                pps.redundant_pic_cnt_present_flag,
            ),
        ];

        if pps.transform_8x8_mode_flag {
            fields.extend([
                SyntaxElement::flag("transform_8x8_mode_flag", true),
                SyntaxElement::flag("pic_scaling_matrix_present_flag", false),
                SyntaxElement::se(
                    "second_chroma_qp_index_offset",
                    pps.second_chroma_qp_index_offset,
                ),
            ]);
        }
        fields
    }

    /// Slice header followed by the dummy slice data.
    pub fn slice_elements(&self, sh: &SliceHeader) -> Vec<SyntaxElement> {
        let sps = &self.config.sps;
        let pps = &self.config.pps;
        let kind = sh.kind();

        let mut fields = vec![
            SyntaxElement::ue("first_mb_in_slice", sh.first_mb_in_slice),
            SyntaxElement::ue("slice_type", sh.slice_type),
            SyntaxElement::ue("pic_parameter_set_id", sh.pic_parameter_set_id),
            SyntaxElement::fixed("frame_num", sh.frame_num, sps.frame_num_bits()),
        ];

        if !sps.frame_mbs_only_flag {
            fields.push(SyntaxElement::flag("field_pic_flag", sh.field_pic_flag));
            if sh.field_pic_flag {
                fields.push(SyntaxElement::flag("bottom_field_flag", sh.bottom_field_flag));
            }
        }

        if sh.is_idr {
            fields.push(SyntaxElement::ue("idr_pic_id", sh.idr_pic_id));
        }

        if sps.pic_order_cnt_type == 0 {
            fields.push(SyntaxElement::fixed(
                "pic_order_cnt_lsb",
                sh.pic_order_cnt_lsb,
                sps.pic_order_cnt_lsb_bits(),
            ));
        }

        if matches!(kind, SliceKind::P | SliceKind::B) {
            if kind == SliceKind::B {
                fields.push(SyntaxElement::flag(
                    "direct_spatial_mv_pred_flag",
                    sh.direct_spatial_mv_pred_flag,
                ));
            }

            fields.push(SyntaxElement::flag(
                "num_ref_idx_active_override_flag",
                sh.num_ref_idx_active_override_flag,
            ));

            if sh.num_ref_idx_active_override_flag {
                fields.push(SyntaxElement::ue(
                    "num_ref_idx_l0_active_minus1",
                    sh.num_ref_idx_l0_active_minus1,
                ));
                if kind == SliceKind::B {
                    fields.push(SyntaxElement::ue(
                        "num_ref_idx_l1_active_minus1",
                        sh.num_ref_idx_l1_active_minus1,
                    ));
                }
            }
        }

        if !kind.is_intra() {
            fields.push(SyntaxElement::flag("ref_pic_list_modification_flag_l0", false));
            if kind == SliceKind::B {
                fields.push(SyntaxElement::flag("ref_pic_list_modification_flag_l1", false));
            }
        }

        if self.config.ref_idc != 0 {
            if sh.is_idr {
                fields.push(SyntaxElement::flag(
                    "no_output_of_prior_pics_flag",
                    sh.no_output_of_prior_pics_flag,
                ));
                fields.push(SyntaxElement::flag(
                    "long_term_reference_flag",
                    sh.long_term_reference_flag,
                ));
            } else {
                fields.push(SyntaxElement::flag("adaptive_ref_pic_marking_mode_flag", false));
            }
        }

        if !kind.is_intra() && pps.entropy_coding_mode_flag {
            fields.push(SyntaxElement::ue("cabac_init_idc", sh.cabac_init_idc));
        }

        fields.push(SyntaxElement::se("slice_qp_delta", sh.slice_qp_delta));

        if pps.deblocking_filter_control_present_flag {
            fields.push(SyntaxElement::ue(
                "disable_deblocking_filter_idc",
                sh.disable_deblocking_filter_idc,
            ));
            if sh.disable_deblocking_filter_idc != 1 {
                fields.push(SyntaxElement::se(
                    "slice_alpha_c0_offset_div2",
                    sh.slice_alpha_c0_offset_div2,
                ));
                fields.push(SyntaxElement::se("slice_beta_offset_div2", sh.slice_beta_offset_div2));
            }
        }

        let macroblocks_nb = if sh.macroblocks_nb != 0 {
            sh.macroblocks_nb
        } else {
            sps.macroblocks_per_picture()
        };

        if kind == SliceKind::I {
            fields.push(SyntaxElement::repeated(
                "DUMMY_MACROBLOCK",
                DUMMY_MACROBLOCK,
                8,
                macroblocks_nb,
            ));
        } else {
            fields.push(SyntaxElement::ue("mb_skip_run", macroblocks_nb));
        }

        fields
    }
}

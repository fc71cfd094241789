//! `WasmInspector`: decoding and CLV angle analysis for the web UI.

use anyhow::anyhow;
use fork_inspect_core::pipeline::{
    analyze_covariant_vectors, decode_branch, decode_branch_point, decode_with_fallback,
    orbit_clv_directions,
};
use fork_inspect_core::records::{BranchRecord, CovariantVectorsRecord, OrbitRecord, SystemRecord};
use fork_inspect_core::{InspectError, InspectSettings, PartialLayout, StateEncoding, TimeWindow};
use js_sys::Float64Array;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_wasm_bindgen::{from_value, to_value};
use wasm_bindgen::prelude::*;

use crate::payload::{describe_error, AngleSeriesPayload, CyclePayload, DirectionsPayload};

#[wasm_bindgen]
pub struct WasmInspector {
    settings: InspectSettings,
}

#[wasm_bindgen]
impl WasmInspector {
    #[wasm_bindgen(constructor)]
    pub fn new(settings_val: JsValue) -> Result<WasmInspector, JsValue> {
        console_error_panic_hook::set_once();
        crate::init_logger();
        let settings: InspectSettings =
            read_or_default(settings_val, "inspection settings").map_err(js_error)?;
        Ok(WasmInspector { settings })
    }

    pub fn set_point_index(&mut self, index: Option<u32>) {
        self.settings.point_index = index.map(|value| value as usize);
    }

    pub fn set_stride(&mut self, stride: u32) {
        self.settings.stride = if stride == 0 { 1 } else { stride as usize };
    }

    pub fn set_subspace_dim(&mut self, leading: Option<u32>) {
        self.settings.subspace_dim = leading.map(|value| value as usize);
    }

    /// Accepts `"mesh_stage"`, `"mesh+stage"` or `"profile"`.
    pub fn set_primary_encoding(&mut self, label: &str) -> Result<(), JsValue> {
        let encoding = StateEncoding::from_label(label)
            .ok_or_else(|| JsValue::from_str(&format!("Unknown state encoding \"{}\".", label)))?;
        self.settings.primary_encoding = encoding;
        Ok(())
    }

    pub fn set_clv_window(&mut self, start: Option<f64>, end: Option<f64>, stride: u32) {
        self.settings.clv_window = TimeWindow { start, end };
        self.settings.clv_stride = if stride == 0 { 1 } else { stride as usize };
    }

    pub fn set_clv_vectors(&mut self, indices: Vec<u32>, max_arrows: u32) {
        self.settings.clv_vectors = indices.into_iter().map(|index| index as usize).collect();
        self.settings.max_arrows = max_arrows as usize;
    }

    /// Decodes one flat state; `hint_val` may be undefined or any subset of `{ ntst, ncol, dim }`.
    pub fn decode_limit_cycle(&self, state: Vec<f64>, hint_val: JsValue) -> Result<JsValue, JsValue> {
        let hint = self.hint(hint_val)?;
        let cycle = decode_with_fallback(&state, &hint, &self.settings).map_err(core_error)?;
        serialize(&CyclePayload::from(cycle))
    }

    /// One coordinate of the decoded, closed profile.
    pub fn profile_component(
        &self,
        state: Vec<f64>,
        hint_val: JsValue,
        axis: u32,
    ) -> Result<Float64Array, JsValue> {
        let hint = self.hint(hint_val)?;
        let cycle = decode_with_fallback(&state, &hint, &self.settings).map_err(core_error)?;
        let values = cycle.profile.component(axis as usize).ok_or_else(|| {
            JsValue::from_str(&format!(
                "Axis {} is out of range for a {}-dimensional cycle.",
                axis, cycle.profile.dim
            ))
        })?;
        Ok(Float64Array::from(values.as_slice()))
    }

    pub fn decode_branch_point(&self, branch_val: JsValue, system_val: JsValue) -> Result<JsValue, JsValue> {
        let branch: BranchRecord = read(branch_val, "branch").map_err(js_error)?;
        let system: Option<SystemRecord> = read_optional(system_val, "system").map_err(js_error)?;
        let cycle =
            decode_branch_point(&branch, system.as_ref(), &self.settings).map_err(core_error)?;
        serialize(&CyclePayload::for_branch(cycle, branch.parameter_label()))
    }

    pub fn decode_branch(&self, branch_val: JsValue, system_val: JsValue) -> Result<JsValue, JsValue> {
        let branch: BranchRecord = read(branch_val, "branch").map_err(js_error)?;
        let system: Option<SystemRecord> = read_optional(system_val, "system").map_err(js_error)?;
        let cycles = decode_branch(&branch, system.as_ref(), &self.settings).map_err(core_error)?;
        let payload: Vec<CyclePayload> = cycles
            .into_iter()
            .map(|cycle| CyclePayload::for_branch(cycle, branch.parameter_label()))
            .collect();
        serialize(&payload)
    }

    /// Minimal E^cu/E^ss angles for a `{ dim, times, vectors }` record.
    pub fn clv_angle_series(&self, record_val: JsValue) -> Result<JsValue, JsValue> {
        let record: CovariantVectorsRecord =
            read(record_val, "covariant vectors").map_err(js_error)?;
        let (split, series) =
            analyze_covariant_vectors(&record, &self.settings).map_err(core_error)?;
        serialize(&AngleSeriesPayload::new(split, series))
    }

    /// Unit CLV directions of an orbit object over the configured window.
    pub fn clv_directions(&self, orbit_val: JsValue) -> Result<JsValue, JsValue> {
        let orbit: OrbitRecord = read(orbit_val, "orbit").map_err(js_error)?;
        let directions = orbit_clv_directions(&orbit, &self.settings).map_err(core_error)?;
        serialize(&DirectionsPayload::from(directions))
    }
}

impl WasmInspector {
    fn hint(&self, hint_val: JsValue) -> Result<PartialLayout, JsValue> {
        let hint: PartialLayout = read_or_default(hint_val, "layout hint").map_err(js_error)?;
        Ok(hint.merged_with(&self.settings.layout))
    }
}

fn is_absent(value: &JsValue) -> bool {
    value.is_undefined() || value.is_null()
}

fn read<T: DeserializeOwned>(value: JsValue, what: &str) -> anyhow::Result<T> {
    from_value(value).map_err(|e| anyhow!("Invalid {}: {}", what, e))
}

fn read_optional<T: DeserializeOwned>(value: JsValue, what: &str) -> anyhow::Result<Option<T>> {
    if is_absent(&value) {
        return Ok(None);
    }
    read(value, what).map(Some)
}

fn read_or_default<T: DeserializeOwned + Default>(value: JsValue, what: &str) -> anyhow::Result<T> {
    Ok(read_optional(value, what)?.unwrap_or_default())
}

fn serialize<T: Serialize>(payload: &T) -> Result<JsValue, JsValue> {
    to_value(payload).map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
}

fn js_error(err: anyhow::Error) -> JsValue {
    JsValue::from_str(&format!("{}", err))
}

fn core_error(err: InspectError) -> JsValue {
    JsValue::from_str(&describe_error(&err))
}

//! External covenant interpreter seam.
//!
//! Skeleton assembly, signing-hash computation, witness dry runs, and raw
//! transaction extraction all go through the `hal-simplicity` CLI. The
//! [`Interpreter`] trait keeps that binary behind a narrow seam so the
//! pipeline can be driven by a scripted double in tests.
//!
//! Amounts cross the CLI boundary in BTC decimal notation; everything on
//! this side of the seam stays in satoshis.

use std::fmt;
use std::path::PathBuf;
use std::process::Command;

use serde::Deserialize;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::models::Outpoint;

/// PSET network flag. Liquid mainnet and testnet share one PSET dialect.
const NETWORK_FLAG: &str = "--liquid";

/// One leg of a transaction output plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlannedOutput {
    /// Pay `value` sats to an address.
    Pay { address: String, value: u64 },
    /// Zero-value OP_RETURN output carrying an annotation payload.
    Annotation { payload: Vec<u8> },
    /// Explicit network fee, mandatory on Elements chains.
    Fee { value: u64 },
}

impl PlannedOutput {
    pub fn pay(address: impl Into<String>, value: u64) -> Self {
        PlannedOutput::Pay {
            address: address.into(),
            value,
        }
    }

    pub fn annotation(payload: Vec<u8>) -> Self {
        PlannedOutput::Annotation { payload }
    }

    pub fn fee(value: u64) -> Self {
        PlannedOutput::Fee { value }
    }

    /// Sats carried by this output.
    pub fn value(&self) -> u64 {
        match self {
            PlannedOutput::Pay { value, .. } | PlannedOutput::Fee { value } => *value,
            PlannedOutput::Annotation { .. } => 0,
        }
    }

    /// Render as the output object `pset create` expects.
    pub(crate) fn to_json(&self, asset_id: &str) -> serde_json::Value {
        match self {
            PlannedOutput::Pay { address, value } => serde_json::json!({
                "address": address,
                "asset": asset_id,
                "amount": btc_value(*value),
            }),
            PlannedOutput::Annotation { payload } => serde_json::json!({
                "address": format!("data:{}", hex::encode(payload)),
                "asset": asset_id,
                "amount": 0,
            }),
            PlannedOutput::Fee { value } => serde_json::json!({
                "address": "fee",
                "asset": asset_id,
                "amount": btc_value(*value),
            }),
        }
    }
}

/// UTXO data bound to a covenant input during skeleton assembly.
///
/// The interpreter needs the full previous-output context to compute the
/// signature hash: script pubkey, asset, amount, the program's commitment
/// Merkle root, and the taproot internal key.
#[derive(Debug, Clone)]
pub struct InputBinding {
    pub script_pubkey: String,
    pub asset_id: String,
    pub value: u64,
    pub cmr: String,
    pub internal_key: String,
}

impl InputBinding {
    /// `script_pubkey:asset:amount` string for `--input-utxo`.
    fn as_utxo_arg(&self) -> String {
        format!(
            "{}:{}:{}",
            self.script_pubkey,
            self.asset_id,
            btc_string(self.value)
        )
    }
}

/// Outcome of one jet inside a program dry run.
#[derive(Debug, Clone, Deserialize)]
pub struct JetOutcome {
    #[serde(default)]
    pub jet: String,
    #[serde(default = "default_true")]
    pub success: bool,
    #[serde(default)]
    pub output_value: Option<String>,
}

fn default_true() -> bool {
    true
}

/// Trace of a program dry run.
///
/// `success: false` with failing jets is an ordinary result, not a CLI
/// error: it is how the covenant reports that a witness or output plan
/// violates one of its checks.
#[derive(Debug, Clone, Deserialize)]
pub struct RunReport {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub jets: Vec<JetOutcome>,
}

impl RunReport {
    /// Digest the covenant commits every signature to, if the trace
    /// produced one. Leading `0x` is stripped.
    pub fn sig_all_hash(&self) -> Option<String> {
        self.jets
            .iter()
            .find(|jet| jet.jet == "sig_all_hash")
            .and_then(|jet| jet.output_value.as_deref())
            .map(|value| value.trim_start_matches("0x").to_string())
    }

    /// Names of every jet that failed during the run.
    pub fn failed_jets(&self) -> Vec<String> {
        self.jets
            .iter()
            .filter(|jet| !jet.success)
            .map(|jet| jet.jet.clone())
            .collect()
    }
}

/// Seam to the external covenant toolchain.
///
/// Implementations wrap a real CLI binary or a scripted test double. All
/// skeleton strings are opaque to callers.
pub trait Interpreter: Send + Sync + fmt::Debug {
    /// Assemble an unsigned transaction skeleton from inputs and an output
    /// plan. Returns the skeleton in the toolchain's serialized form.
    fn create(
        &self,
        inputs: &[Outpoint],
        outputs: &[PlannedOutput],
        asset_id: &str,
    ) -> Result<String>;

    /// Attach previous-output data and contract commitments to one input.
    fn update_input(&self, skeleton: &str, index: usize, binding: &InputBinding)
        -> Result<String>;

    /// Dry-run the program against the skeleton with the given witness.
    fn run(
        &self,
        skeleton: &str,
        index: usize,
        program: &str,
        witness_hex: &str,
    ) -> Result<RunReport>;

    /// Finalize one input with program and witness.
    fn finalize(
        &self,
        skeleton: &str,
        index: usize,
        program: &str,
        witness_hex: &str,
    ) -> Result<String>;

    /// Extract raw transaction hex from a fully finalized skeleton.
    fn extract(&self, skeleton: &str) -> Result<String>;
}

/// `hal-simplicity` CLI wrapper.
#[derive(Debug, Clone)]
pub struct HalSimplicity {
    binary: PathBuf,
}

#[derive(Deserialize)]
struct SkeletonEnvelope {
    pset: String,
}

impl HalSimplicity {
    /// Wrap the binary at `binary`. Bare names resolve through PATH at
    /// invocation time; a missing binary surfaces as
    /// [`Error::InterpreterNotFound`] on first use.
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        HalSimplicity {
            binary: binary.into(),
        }
    }

    fn run_command(&self, args: &[String]) -> Result<String> {
        let command = command_name(args);
        trace!(%command, "invoking interpreter");
        let output = Command::new(&self.binary).args(args).output().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::InterpreterNotFound {
                    path: self.binary.display().to_string(),
                }
            } else {
                Error::InterpreterFailed {
                    command: command.clone(),
                    detail: e.to_string(),
                }
            }
        })?;

        if !output.status.success() {
            let detail = String::from_utf8_lossy(&output.stderr).trim().to_string();
            debug!(%command, %detail, "interpreter exited non-zero");
            return Err(Error::InterpreterFailed { command, detail });
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    fn run_json<T: serde::de::DeserializeOwned>(&self, args: &[String]) -> Result<T> {
        let stdout = self.run_command(args)?;
        let value: serde_json::Value = serde_json::from_str(&stdout)
            .map_err(|e| Error::InvalidInterpreterOutput(format!("{e}: {stdout}")))?;

        // The CLI reports some failures as JSON rather than exit status.
        if let Some(detail) = value.get("error").and_then(|v| v.as_str()) {
            return Err(Error::InterpreterFailed {
                command: command_name(args),
                detail: detail.to_string(),
            });
        }

        serde_json::from_value(value).map_err(|e| Error::InvalidInterpreterOutput(e.to_string()))
    }
}

impl Interpreter for HalSimplicity {
    fn create(
        &self,
        inputs: &[Outpoint],
        outputs: &[PlannedOutput],
        asset_id: &str,
    ) -> Result<String> {
        let inputs_json = serde_json::Value::Array(
            inputs
                .iter()
                .map(|input| {
                    serde_json::json!({
                        "txid": input.txid.to_hex(),
                        "vout": input.vout,
                    })
                })
                .collect(),
        );
        let outputs_json = serde_json::Value::Array(
            outputs.iter().map(|output| output.to_json(asset_id)).collect(),
        );

        let envelope: SkeletonEnvelope = self.run_json(&[
            "simplicity".to_string(),
            "pset".to_string(),
            "create".to_string(),
            NETWORK_FLAG.to_string(),
            inputs_json.to_string(),
            outputs_json.to_string(),
        ])?;
        Ok(envelope.pset)
    }

    fn update_input(&self, skeleton: &str, index: usize, binding: &InputBinding) -> Result<String> {
        let envelope: SkeletonEnvelope = self.run_json(&[
            "simplicity".to_string(),
            "pset".to_string(),
            "update-input".to_string(),
            NETWORK_FLAG.to_string(),
            skeleton.to_string(),
            index.to_string(),
            "--input-utxo".to_string(),
            binding.as_utxo_arg(),
            "--cmr".to_string(),
            binding.cmr.clone(),
            "--internal-key".to_string(),
            binding.internal_key.clone(),
        ])?;
        Ok(envelope.pset)
    }

    fn run(
        &self,
        skeleton: &str,
        index: usize,
        program: &str,
        witness_hex: &str,
    ) -> Result<RunReport> {
        self.run_json(&[
            "simplicity".to_string(),
            "pset".to_string(),
            "run".to_string(),
            NETWORK_FLAG.to_string(),
            skeleton.to_string(),
            index.to_string(),
            program.to_string(),
            witness_hex.to_string(),
        ])
    }

    fn finalize(
        &self,
        skeleton: &str,
        index: usize,
        program: &str,
        witness_hex: &str,
    ) -> Result<String> {
        let envelope: SkeletonEnvelope = self.run_json(&[
            "simplicity".to_string(),
            "pset".to_string(),
            "finalize".to_string(),
            NETWORK_FLAG.to_string(),
            skeleton.to_string(),
            index.to_string(),
            program.to_string(),
            witness_hex.to_string(),
        ])?;
        Ok(envelope.pset)
    }

    fn extract(&self, skeleton: &str) -> Result<String> {
        let output = self.run_command(&[
            "simplicity".to_string(),
            "pset".to_string(),
            "extract".to_string(),
            NETWORK_FLAG.to_string(),
            skeleton.to_string(),
        ])?;
        // Some CLI versions quote the hex string.
        Ok(output.trim_matches('"').to_string())
    }
}

/// First words of an argument list, for error context.
fn command_name(args: &[String]) -> String {
    args.iter()
        .take(3)
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Sats as a JSON number in BTC units.
fn btc_value(sats: u64) -> f64 {
    sats as f64 / 100_000_000.0
}

/// Sats as a fixed 8-decimal BTC string.
fn btc_string(sats: u64) -> String {
    format!("{:.8}", sats as f64 / 100_000_000.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Txid;

    const ASSET: &str = "144c654344aa716d6f3abcc1ca90e5641e4e2a7f633bc09fe3baf64585819a49";

    #[test]
    fn test_btc_string_formatting() {
        assert_eq!(btc_string(546), "0.00000546");
        assert_eq!(btc_string(100_000), "0.00100000");
        assert_eq!(btc_string(0), "0.00000000");
        assert_eq!(btc_string(150_000_000), "1.50000000");
    }

    #[test]
    fn test_pay_output_json() {
        let output = PlannedOutput::pay("tex1pvault", 98_954);
        let json = output.to_json(ASSET);
        assert_eq!(json["address"], "tex1pvault");
        assert_eq!(json["asset"], ASSET);
        assert!((json["amount"].as_f64().unwrap() - 0.00098954).abs() < 1e-12);
    }

    #[test]
    fn test_annotation_output_json() {
        let output = PlannedOutput::annotation(vec![0x53, 0x41, 0x53, 0x01, 0x01, 0xAB]);
        let json = output.to_json(ASSET);
        assert_eq!(json["address"], "data:5341530101ab");
        assert_eq!(json["amount"], 0);
    }

    #[test]
    fn test_fee_output_json() {
        let json = PlannedOutput::fee(500).to_json(ASSET);
        assert_eq!(json["address"], "fee");
        assert!((json["amount"].as_f64().unwrap() - 0.00000500).abs() < 1e-12);
    }

    #[test]
    fn test_output_values() {
        assert_eq!(PlannedOutput::pay("addr", 1000).value(), 1000);
        assert_eq!(PlannedOutput::annotation(vec![1, 2]).value(), 0);
        assert_eq!(PlannedOutput::fee(500).value(), 500);
    }

    #[test]
    fn test_input_binding_utxo_arg() {
        let binding = InputBinding {
            script_pubkey: "5120aabb".to_string(),
            asset_id: ASSET.to_string(),
            value: 100_000,
            cmr: "cc".to_string(),
            internal_key: "dd".to_string(),
        };
        assert_eq!(
            binding.as_utxo_arg(),
            format!("5120aabb:{ASSET}:0.00100000")
        );
    }

    #[test]
    fn test_run_report_extracts_sig_all_hash() {
        let report: RunReport = serde_json::from_str(
            r#"{
              "success": true,
              "jets": [
                {"jet": "check_version", "success": true},
                {"jet": "sig_all_hash", "success": true,
                 "output_value": "0xe3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"}
              ]
            }"#,
        )
        .unwrap();
        assert!(report.success);
        assert_eq!(
            report.sig_all_hash().as_deref(),
            Some("e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855")
        );
        assert!(report.failed_jets().is_empty());
    }

    #[test]
    fn test_run_report_collects_failed_jets() {
        let report: RunReport = serde_json::from_str(
            r#"{
              "success": false,
              "jets": [
                {"jet": "check_sig_verify", "success": false},
                {"jet": "verify_output_value", "success": false},
                {"jet": "sig_all_hash", "success": true, "output_value": "0xab"}
              ]
            }"#,
        )
        .unwrap();
        assert!(!report.success);
        assert_eq!(
            report.failed_jets(),
            vec!["check_sig_verify", "verify_output_value"]
        );
    }

    #[test]
    fn test_run_report_without_hash_jet() {
        let report: RunReport = serde_json::from_str(r#"{"success": true, "jets": []}"#).unwrap();
        assert_eq!(report.sig_all_hash(), None);
    }

    #[test]
    fn test_missing_binary_is_not_found() {
        let hal = HalSimplicity::new("/nonexistent/hal-simplicity");
        let outpoint = Outpoint {
            txid: Txid::from_bytes([0xAA; 32]),
            vout: 0,
        };
        match hal.create(&[outpoint], &[PlannedOutput::fee(500)], ASSET) {
            Err(Error::InterpreterNotFound { path }) => {
                assert_eq!(path, "/nonexistent/hal-simplicity");
            }
            res => panic!("Expected InterpreterNotFound, got {:?}", res),
        }
    }

    #[test]
    fn test_command_name_takes_leading_words() {
        let args = vec![
            "simplicity".to_string(),
            "pset".to_string(),
            "run".to_string(),
            "--liquid".to_string(),
            "base64...".to_string(),
        ];
        assert_eq!(command_name(&args), "simplicity pset run");
    }
}

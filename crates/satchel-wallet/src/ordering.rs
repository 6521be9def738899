//! Input and output ordering applied after coin selection.
//!
//! Ordering never changes which inputs were chosen, only where they sit in
//! the transaction.

use std::cmp::Ordering;

use bitcoin::TxOut;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use satchel_core::types::Unspent;
use serde::{Deserialize, Serialize};

/// How inputs and outputs are arranged before signing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxOrdering {
    /// BIP69: inputs by txid then vout, outputs by value then script.
    #[default]
    Bip69,
    /// Selection order for inputs, request order for outputs, change last.
    Preserve,
    /// Pseudo-random permutation from a fixed seed.
    Shuffle { seed: u64 },
}

impl TxOrdering {
    pub fn apply(&self, inputs: &mut [Unspent], outputs: &mut [TxOut]) {
        match self {
            TxOrdering::Bip69 => {
                inputs.sort_by(bip69_input_cmp);
                outputs.sort_by(bip69_output_cmp);
            }
            TxOrdering::Preserve => {}
            TxOrdering::Shuffle { seed } => {
                let mut rng = StdRng::seed_from_u64(*seed);
                inputs.shuffle(&mut rng);
                outputs.shuffle(&mut rng);
            }
        }
    }
}

fn bip69_input_cmp(a: &Unspent, b: &Unspent) -> Ordering {
    a.tx_id
        .to_ascii_lowercase()
        .cmp(&b.tx_id.to_ascii_lowercase())
        .then(a.vout.cmp(&b.vout))
}

fn bip69_output_cmp(a: &TxOut, b: &TxOut) -> Ordering {
    a.value
        .cmp(&b.value)
        .then_with(|| a.script_pubkey.as_bytes().cmp(b.script_pubkey.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::ScriptBuf;

    fn input(fill: char, vout: u32, value: u64) -> Unspent {
        Unspent {
            tx_id: fill.to_string().repeat(64),
            vout,
            address: String::new(),
            value,
            confirmations: 1,
        }
    }

    fn output(value: u64, script: &[u8]) -> TxOut {
        TxOut {
            value,
            script_pubkey: ScriptBuf::from_bytes(script.to_vec()),
        }
    }

    #[test]
    fn bip69_inputs() {
        let mut inputs = vec![input('b', 0, 1), input('a', 2, 2), input('a', 1, 3)];
        TxOrdering::Bip69.apply(&mut inputs, &mut []);
        let keys: Vec<(char, u32)> = inputs
            .iter()
            .map(|u| (u.tx_id.chars().next().unwrap(), u.vout))
            .collect();
        assert_eq!(keys, vec![('a', 1), ('a', 2), ('b', 0)]);
    }

    #[test]
    fn bip69_inputs_ignore_hex_case() {
        let mut upper = input('B', 0, 1);
        upper.tx_id = upper.tx_id.to_uppercase();
        let mut inputs = vec![upper, input('a', 0, 1)];
        TxOrdering::Bip69.apply(&mut inputs, &mut []);
        assert!(inputs[0].tx_id.starts_with('a'));
    }

    #[test]
    fn bip69_outputs() {
        let mut outputs = vec![output(500, &[0x02]), output(100, &[0x05]), output(500, &[0x01])];
        TxOrdering::Bip69.apply(&mut [], &mut outputs);
        assert_eq!(outputs[0].value, 100);
        assert_eq!(outputs[1].script_pubkey.as_bytes(), &[0x01]);
        assert_eq!(outputs[2].script_pubkey.as_bytes(), &[0x02]);
    }

    #[test]
    fn preserve_is_identity() {
        let mut inputs = vec![input('b', 0, 1), input('a', 0, 2)];
        let mut outputs = vec![output(2, &[]), output(1, &[])];
        let (i0, o0) = (inputs.clone(), outputs.clone());
        TxOrdering::Preserve.apply(&mut inputs, &mut outputs);
        assert_eq!(inputs, i0);
        assert_eq!(outputs, o0);
    }

    #[test]
    fn shuffle_is_reproducible() {
        let base: Vec<Unspent> = ('a'..='j').map(|c| input(c, 0, 1)).collect();
        let mut first = base.clone();
        let mut second = base.clone();
        TxOrdering::Shuffle { seed: 42 }.apply(&mut first, &mut []);
        TxOrdering::Shuffle { seed: 42 }.apply(&mut second, &mut []);
        assert_eq!(first, second);

        let mut sorted = first.clone();
        sorted.sort_by(bip69_input_cmp);
        assert_eq!(sorted, base);
    }

    #[test]
    fn serde_names() {
        assert_eq!(serde_json::to_string(&TxOrdering::Bip69).unwrap(), "\"bip69\"");
        let back: TxOrdering = serde_json::from_str(r#"{"shuffle":{"seed":7}}"#).unwrap();
        assert_eq!(back, TxOrdering::Shuffle { seed: 7 });
    }
}

//! Genome persistence.
//!
//! Two encodings share one intermediate form, [`GenomeRecord`]:
//!
//! - **JSON** through serde (`Genome` itself serializes via the record);
//! - a compact **text** format: a header line
//!   `inputs outputs hidden activation` followed by one
//!   `source target weight bias` line per synapse. Blank lines and lines
//!   starting with `#` are ignored. Floats are written in Rust's shortest
//!   round-trip form, so decoding reproduces every weight bit for bit.
//!
//! Decoding rebuilds the genome synapse by synapse through the same
//! validation as mutation: out-of-range ids, invalid endpoints, duplicate
//! pairs, cycles, non-finite payloads and unknown activations are rejected.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use serde::{ser, Deserialize, Serialize, Serializer};

use crate::activation::Activation;
use crate::error::{Error, Result};
use crate::gene::{NeuronId, NeuronKind};
use crate::genome::Genome;

/// One synapse in persisted form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynapseRecord {
    /// Source neuron id.
    pub source: usize,
    /// Target neuron id.
    pub target: usize,
    /// Edge weight.
    pub weight: f64,
    /// Edge bias.
    pub bias: f64,
}

/// A genome in persisted form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenomeRecord {
    /// Number of input neurons.
    pub inputs: usize,
    /// Number of output neurons.
    pub outputs: usize,
    /// Number of hidden neurons.
    pub hidden: usize,
    /// Activation name, see [`Activation::name`].
    pub activation: String,
    /// Synapses in ascending `(source, target)` order.
    pub synapses: Vec<SynapseRecord>,
}

impl TryFrom<&Genome> for GenomeRecord {
    type Error = Error;

    /// Fails on a non-finite weight or bias, which neither encoding can
    /// carry back.
    fn try_from(genome: &Genome) -> Result<Self> {
        let synapses = genome
            .synapses()
            .map(|synapse| {
                if !synapse.weight.is_finite() || !synapse.bias.is_finite() {
                    return Err(Error::codec(
                        0,
                        format!(
                            "synapse {} -> {} has a non-finite weight or bias",
                            synapse.source(),
                            synapse.target()
                        ),
                    ));
                }
                Ok(SynapseRecord {
                    source: synapse.source().index(),
                    target: synapse.target().index(),
                    weight: synapse.weight,
                    bias: synapse.bias,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            inputs: genome.inputs(),
            outputs: genome.outputs(),
            hidden: genome.hidden(),
            activation: genome.activation().name().to_owned(),
            synapses,
        })
    }
}

impl Serialize for Genome {
    fn serialize<Z: Serializer>(&self, serializer: Z) -> std::result::Result<Z::Ok, Z::Error> {
        GenomeRecord::try_from(self)
            .map_err(<Z::Error as ser::Error>::custom)?
            .serialize(serializer)
    }
}

impl TryFrom<GenomeRecord> for Genome {
    type Error = Error;

    fn try_from(record: GenomeRecord) -> Result<Self> {
        let mut genome = skeleton(
            record.inputs,
            record.outputs,
            record.hidden,
            &record.activation,
            record.synapses.len(),
            0,
        )?;
        for synapse in &record.synapses {
            attach(&mut genome, synapse, 0)?;
        }
        Ok(genome)
    }
}

/// Neurons and activation, no synapses yet.
///
/// Every hidden neuron is created by splitting a synapse and keeps at least
/// one incoming synapse, so `hidden` can never exceed `synapses`.
fn skeleton(
    inputs: usize,
    outputs: usize,
    hidden: usize,
    activation: &str,
    synapses: usize,
    line: usize,
) -> Result<Genome> {
    let activation: Activation = activation
        .parse()
        .map_err(|err: Error| Error::codec(line, err.to_string()))?;
    let mut genome = Genome::empty(inputs, outputs, activation)
        .map_err(|err| Error::codec(line, err.to_string()))?;
    if hidden > synapses {
        return Err(Error::codec(
            line,
            format!("{hidden} hidden neurons but only {synapses} synapses"),
        ));
    }
    if !genome.extend_hidden(hidden) {
        return Err(Error::codec(
            line,
            format!("neuron count {inputs} + {outputs} + {hidden} overflows"),
        ));
    }
    Ok(genome)
}

/// Insert one persisted synapse, explaining any rejection.
fn attach(genome: &mut Genome, record: &SynapseRecord, line: usize) -> Result<()> {
    let (source, target) = (NeuronId(record.source), NeuronId(record.target));
    if !record.weight.is_finite() || !record.bias.is_finite() {
        return Err(Error::codec(
            line,
            format!("synapse {source} -> {target} has a non-finite weight or bias"),
        ));
    }

    let (Some(source_kind), Some(target_kind)) = (genome.kind_of(source), genome.kind_of(target))
    else {
        return Err(Error::codec(
            line,
            format!(
                "synapse {source} -> {target} references a neuron outside 0..{}",
                genome.neuron_count()
            ),
        ));
    };
    if source_kind == NeuronKind::Output || target_kind == NeuronKind::Input {
        return Err(Error::codec(
            line,
            format!("synapse {source} -> {target} runs from {source_kind:?} to {target_kind:?}"),
        ));
    }
    if genome.synapse(source, target).is_some() {
        return Err(Error::codec(
            line,
            format!("duplicate synapse {source} -> {target}"),
        ));
    }
    if !genome.insert_synapse(source, target, record.weight, record.bias) {
        return Err(Error::codec(
            line,
            format!("synapse {source} -> {target} would create a cycle"),
        ));
    }
    Ok(())
}

/// Encode a genome as JSON.
///
/// # Errors
///
/// Returns [`Error::Codec`] for a non-finite weight or bias and
/// [`Error::Json`] if serialization fails.
pub fn to_json(genome: &Genome) -> Result<String> {
    Ok(serde_json::to_string(&GenomeRecord::try_from(genome)?)?)
}

/// Decode a genome from JSON.
///
/// # Errors
///
/// Returns [`Error::Json`] for malformed JSON and [`Error::Codec`] for a
/// record that does not describe a valid genome.
pub fn from_json(json: &str) -> Result<Genome> {
    let record: GenomeRecord = serde_json::from_str(json)?;
    Genome::try_from(record)
}

/// Encode a genome in the text format.
///
/// # Errors
///
/// Returns [`Error::Codec`] for a non-finite weight or bias.
pub fn to_text(genome: &Genome) -> Result<String> {
    let record = GenomeRecord::try_from(genome)?;
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = writeln!(
        out,
        "{} {} {} {}",
        record.inputs, record.outputs, record.hidden, record.activation
    );
    for synapse in &record.synapses {
        let _ = writeln!(
            out,
            "{} {} {} {}",
            synapse.source, synapse.target, synapse.weight, synapse.bias
        );
    }
    Ok(out)
}

/// Decode a genome from the text format.
///
/// # Errors
///
/// Returns [`Error::Codec`] with the offending 1-based line number.
pub fn from_text(text: &str) -> Result<Genome> {
    let mut lines = text
        .lines()
        .enumerate()
        .map(|(idx, line)| (idx + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'));

    let (header_line, header) = lines
        .next()
        .ok_or_else(|| Error::codec(0, "missing header line"))?;
    let fields: Vec<&str> = header.split_whitespace().collect();
    let &[inputs, outputs, hidden, activation] = fields.as_slice() else {
        return Err(Error::codec(
            header_line,
            format!(
                "header needs `inputs outputs hidden activation`, got {} fields",
                fields.len()
            ),
        ));
    };
    let (inputs, outputs, hidden) = (
        parse_field(inputs, "inputs", header_line)?,
        parse_field(outputs, "outputs", header_line)?,
        parse_field(hidden, "hidden", header_line)?,
    );

    let mut records = Vec::new();
    for (line_no, line) in lines {
        let fields: Vec<&str> = line.split_whitespace().collect();
        let &[source, target, weight, bias] = fields.as_slice() else {
            return Err(Error::codec(
                line_no,
                format!(
                    "synapse needs `source target weight bias`, got {} fields",
                    fields.len()
                ),
            ));
        };
        let record = SynapseRecord {
            source: parse_field(source, "source", line_no)?,
            target: parse_field(target, "target", line_no)?,
            weight: parse_field(weight, "weight", line_no)?,
            bias: parse_field(bias, "bias", line_no)?,
        };
        records.push((line_no, record));
    }

    let mut genome = skeleton(
        inputs,
        outputs,
        hidden,
        activation,
        records.len(),
        header_line,
    )?;
    for (line_no, record) in &records {
        attach(&mut genome, record, *line_no)?;
    }
    Ok(genome)
}

fn parse_field<T: std::str::FromStr>(raw: &str, name: &str, line: usize) -> Result<T> {
    raw.parse()
        .map_err(|_| Error::codec(line, format!("invalid {name} `{raw}`")))
}

/// Write a genome to `path`: JSON for a `.json` extension, text otherwise.
///
/// # Errors
///
/// Returns [`Error::Codec`] for a non-finite weight or bias, otherwise
/// [`Error::Io`] or [`Error::Json`] on failure.
pub fn save(genome: &Genome, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let encoded = if is_json(path) {
        to_json(genome)?
    } else {
        to_text(genome)?
    };
    fs::write(path, encoded)?;
    tracing::debug!(path = %path.display(), synapses = genome.synapse_count(), "saved genome");
    Ok(())
}

/// Read a genome written by [`save`].
///
/// # Errors
///
/// Returns [`Error::Io`] if the file cannot be read, otherwise the decoding
/// errors of [`from_json`] or [`from_text`].
pub fn load(path: impl AsRef<Path>) -> Result<Genome> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path)?;
    if is_json(path) {
        from_json(&raw)
    } else {
        from_text(&raw)
    }
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn evolved_genome() -> Genome {
        let mut rng = ChaCha8Rng::seed_from_u64(123);
        let mut genome = Genome::new(3, 2, Activation::Tanh, &mut rng).unwrap();
        for _ in 0..20 {
            genome.mutate(3, &mut rng);
        }
        genome
    }

    fn assert_equivalent(original: &Genome, restored: &Genome) {
        assert_eq!(original.inputs(), restored.inputs());
        assert_eq!(original.outputs(), restored.outputs());
        assert_eq!(original.hidden(), restored.hidden());
        assert_eq!(original.activation(), restored.activation());
        assert_eq!(
            original.synapses().cloned().collect::<Vec<_>>(),
            restored.synapses().cloned().collect::<Vec<_>>()
        );

        let input = [0.25, -0.5, 1.5];
        let a = original.forward(&input).unwrap();
        let b = restored.forward(&input).unwrap();
        assert_eq!(
            a.iter().map(|v| v.to_bits()).collect::<Vec<_>>(),
            b.iter().map(|v| v.to_bits()).collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_json_roundtrip() {
        let genome = evolved_genome();
        let restored = from_json(&to_json(&genome).unwrap()).unwrap();
        assert_equivalent(&genome, &restored);
    }

    #[test]
    fn test_serde_on_genome_directly() {
        let genome = evolved_genome();
        let json = serde_json::to_string(&genome).expect("Serialization failed");
        let restored: Genome = serde_json::from_str(&json).expect("Deserialization failed");
        assert_equivalent(&genome, &restored);
    }

    #[test]
    fn test_text_roundtrip() {
        let genome = evolved_genome();
        let text = to_text(&genome).unwrap();
        assert!(text.starts_with(&format!("3 2 {} Tanh\n", genome.hidden())));
        let restored = from_text(&text).unwrap();
        assert_equivalent(&genome, &restored);
    }

    #[test]
    fn test_text_accepts_comments_and_legacy_names() {
        let text = "# worked example\n2 1 0 Relu\n\n0 2 2 0.5\n1 2 3 1.5\n";
        let genome = from_text(text).unwrap();
        assert_eq!(genome.activation(), Activation::ReLU);
        assert_eq!(genome.forward(&[1.0, 0.0]).unwrap(), vec![4.0]);
    }

    #[test]
    fn test_text_rejects_malformed_input() {
        let cases = [
            ("", 0, "missing header"),
            ("2 1 ReLU\n", 1, "header"),
            ("0 1 0 ReLU\n", 1, "invalid genome dimensions"),
            ("2 1 0 Swish\n", 1, "Swish"),
            ("2 1 0 ReLU\n0 2 abc 0\n", 2, "invalid weight"),
            ("2 1 0 ReLU\n0 7 1 0\n", 2, "outside"),
            ("2 1 0 ReLU\n2 0 1 0\n", 2, "Output"),
            ("2 1 0 ReLU\n0 2 1 0\n0 2 1 0\n", 3, "duplicate"),
            ("2 1 2 ReLU\n3 4 1 0\n4 3 1 0\n", 3, "cycle"),
            ("2 1 0 ReLU\n0 2 inf 0\n", 2, "non-finite"),
            ("1 18446744073709551615 1 ReLU\n", 1, "invalid genome dimensions"),
            ("1 1 4000000000 ReLU\n0 1 1 0\n", 1, "hidden neurons but only 1 synapses"),
            ("1 1 -1 ReLU\n", 1, "invalid hidden"),
        ];
        for (text, expected_line, needle) in cases {
            match from_text(text) {
                Err(Error::Codec { line, reason }) => {
                    assert_eq!(line, expected_line, "{text:?}: {reason}");
                    assert!(reason.contains(needle), "{text:?}: {reason}");
                }
                other => panic!("{text:?} should fail, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_json_rejects_cycle() {
        let record = GenomeRecord {
            inputs: 1,
            outputs: 1,
            hidden: 2,
            activation: "ReLU".into(),
            synapses: vec![
                SynapseRecord { source: 2, target: 3, weight: 1.0, bias: 0.0 },
                SynapseRecord { source: 3, target: 2, weight: 1.0, bias: 0.0 },
            ],
        };
        let json = serde_json::to_string(&record).unwrap();
        assert!(matches!(from_json(&json), Err(Error::Codec { .. })));
        assert!(serde_json::from_str::<Genome>(&json).is_err());
    }

    #[test]
    fn test_json_rejects_bad_counts() {
        let record = |inputs, outputs, hidden, synapses| GenomeRecord {
            inputs,
            outputs,
            hidden,
            activation: "ReLU".into(),
            synapses,
        };
        let edge = SynapseRecord { source: 0, target: 1, weight: 1.0, bias: 0.0 };
        let cases = [
            record(usize::MAX, 1, 0, vec![]),
            record(1, 1, usize::MAX, vec![edge.clone()]),
            record(1, 1, 2, vec![edge]),
        ];
        for case in cases {
            let json = serde_json::to_string(&case).unwrap();
            assert!(matches!(from_json(&json), Err(Error::Codec { .. })), "{json}");
        }
    }

    #[test]
    fn test_non_finite_payload_fails_to_encode() {
        let mut genome = Genome::empty(1, 1, Activation::ReLU).unwrap();
        assert!(genome.insert_synapse(NeuronId(0), NeuronId(1), 1.0, 0.0));
        if let Some(synapse) = genome.synapse_mut(NeuronId(0), NeuronId(1)) {
            *synapse.weight = f64::INFINITY;
        }
        assert_eq!(genome.forward(&[1.0]).unwrap(), vec![f64::INFINITY]);

        assert!(matches!(to_text(&genome), Err(Error::Codec { line: 0, .. })));
        assert!(matches!(to_json(&genome), Err(Error::Codec { line: 0, .. })));
        assert!(serde_json::to_string(&genome).is_err());

        let path = std::env::temp_dir().join(format!(
            "symbios-neuroevo-nonfinite-{}.txt",
            std::process::id()
        ));
        assert!(save(&genome, &path).is_err());
        assert!(!path.exists());
    }

    #[test]
    fn test_save_and_load_files() {
        let genome = evolved_genome();
        let dir = std::env::temp_dir().join(format!("symbios-neuroevo-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();

        for name in ["genome.json", "genome.txt"] {
            let path = dir.join(name);
            save(&genome, &path).unwrap();
            let restored = load(&path).unwrap();
            assert_equivalent(&genome, &restored);
        }

        let json_head = fs::read_to_string(dir.join("genome.json")).unwrap();
        assert!(json_head.trim_start().starts_with('{'));
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_load_missing_file() {
        let path = std::env::temp_dir().join("symbios-neuroevo-does-not-exist.txt");
        assert!(matches!(load(path), Err(Error::Io(_))));
    }
}

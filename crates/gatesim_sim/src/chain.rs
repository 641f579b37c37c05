//! Cascaded gate chains built from NAND primitives.
//!
//! A chain over `n` inputs has `n - 1` stages and `n - 2` inter-stage
//! signals. Stage 0 reads inputs 0 and 1; stage `i > 0` reads the output of
//! stage `i - 1` and input `i + 1`; the last stage drives the chain output.
//!
//! Two stage kinds share that topology:
//!
//! - [`StageKind::Nand`]: each stage is one 2-input NAND.
//! - [`StageKind::Xor`]: each stage is a 2-input XOR cell of four NANDs, so
//!   the settled output is the parity of all inputs.

use std::fmt;

use crate::error::SimError;
use crate::gate::GateId;
use crate::netlist::Netlist;
use crate::signal::SignalId;

/// Minimum number of inputs a chain accepts.
pub const CHAIN_MIN_INPUTS: usize = 2;

/// What each stage of a chain is made of.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StageKind {
    /// A single 2-input NAND.
    Nand,
    /// A 2-input XOR realized with four NANDs.
    Xor,
}

impl StageKind {
    /// NAND gates per stage.
    pub fn gates_per_stage(self) -> usize {
        match self {
            StageKind::Nand => 1,
            StageKind::Xor => 4,
        }
    }

    /// Longest NAND path through one stage.
    pub fn stage_depth(self) -> usize {
        match self {
            StageKind::Nand => 1,
            StageKind::Xor => 3,
        }
    }

    /// Folds `inputs` through the chain the way the settled circuit does.
    /// An empty slice folds to `false`.
    pub fn fold(self, inputs: &[bool]) -> bool {
        let Some((&first, rest)) = inputs.split_first() else {
            return false;
        };
        rest.iter().fold(first, |acc, &v| match self {
            StageKind::Nand => !(acc && v),
            StageKind::Xor => acc ^ v,
        })
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageKind::Nand => write!(f, "nand"),
            StageKind::Xor => write!(f, "xor"),
        }
    }
}

/// A validated chain configuration, ready to be placed into a netlist.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChainSpec {
    name: String,
    kind: StageKind,
    inputs: usize,
}

impl ChainSpec {
    /// Configures a chain of `kind` stages over `inputs` inputs.
    ///
    /// Fails with [`SimError::TooFewInputs`] when `inputs < 2`.
    pub fn new(name: impl Into<String>, kind: StageKind, inputs: usize) -> Result<Self, SimError> {
        let name = name.into();
        if inputs < CHAIN_MIN_INPUTS {
            return Err(SimError::TooFewInputs {
                name,
                min: CHAIN_MIN_INPUTS,
                got: inputs,
            });
        }
        Ok(Self { name, kind, inputs })
    }

    /// Number of inputs.
    pub fn inputs(&self) -> usize {
        self.inputs
    }

    /// Stage kind.
    pub fn kind(&self) -> StageKind {
        self.kind
    }

    /// Creates fresh external inputs `<name>.in<i>` and output `<name>.z`,
    /// then wires the chain between them.
    pub fn build(&self, netlist: &mut Netlist) -> Result<GateChain, SimError> {
        let inputs: Vec<SignalId> = (0..self.inputs)
            .map(|i| netlist.add_input(format!("{}.in{i}", self.name)))
            .collect();
        let output = netlist.add_signal(format!("{}.z", self.name));
        self.wire(netlist, &inputs, output)
    }

    /// Wires the chain between existing signals.
    ///
    /// All checks happen before anything is added, so a failed call leaves
    /// the netlist untouched.
    pub fn wire(
        &self,
        netlist: &mut Netlist,
        inputs: &[SignalId],
        output: SignalId,
    ) -> Result<GateChain, SimError> {
        if inputs.len() != self.inputs {
            return Err(SimError::PortCountMismatch {
                name: self.name.clone(),
                expected: self.inputs,
                got: inputs.len(),
            });
        }
        for &id in inputs.iter().chain(std::iter::once(&output)) {
            netlist.check_signal(id)?;
        }
        if let Some(existing) = netlist.signal(output).driver {
            return Err(SimError::MultipleDrivers {
                signal: netlist.signal(output).name.clone(),
                existing: netlist.describe_driver(existing),
                new: format!("chain `{}`", self.name),
            });
        }

        let n = self.inputs;
        let internal: Vec<SignalId> = (0..n - 2)
            .map(|i| netlist.add_signal(format!("{}.s{i}", self.name)))
            .collect();

        let mut stages = Vec::with_capacity(n - 1);
        for i in 0..n - 1 {
            let (a, b) = if i == 0 {
                (inputs[0], inputs[1])
            } else {
                (internal[i - 1], inputs[i + 1])
            };
            let out = if i == n - 2 { output } else { internal[i] };
            let gates = match self.kind {
                StageKind::Nand => {
                    vec![netlist.add_nand(format!("{}.nand{i}", self.name), &[a, b], out)?]
                }
                StageKind::Xor => xor_cell(netlist, &format!("{}.xor{i}", self.name), a, b, out)?,
            };
            stages.push(Stage { gates, output: out });
        }

        Ok(GateChain {
            name: self.name.clone(),
            kind: self.kind,
            inputs: inputs.to_vec(),
            output,
            internal,
            stages,
        })
    }
}

/// Places `out = a ^ b` as four NANDs:
/// `t = !(a&b)`, `u = !(a&t)`, `v = !(b&t)`, `out = !(u&v)`.
fn xor_cell(
    netlist: &mut Netlist,
    name: &str,
    a: SignalId,
    b: SignalId,
    out: SignalId,
) -> Result<Vec<GateId>, SimError> {
    let t = netlist.add_signal(format!("{name}.t"));
    let u = netlist.add_signal(format!("{name}.u"));
    let v = netlist.add_signal(format!("{name}.v"));
    Ok(vec![
        netlist.add_nand(format!("{name}.n0"), &[a, b], t)?,
        netlist.add_nand(format!("{name}.n1"), &[a, t], u)?,
        netlist.add_nand(format!("{name}.n2"), &[b, t], v)?,
        netlist.add_nand(format!("{name}.n3"), &[u, v], out)?,
    ])
}

/// One stage of a placed chain.
#[derive(Clone, Debug)]
pub struct Stage {
    /// Gates making up the stage, in placement order.
    pub gates: Vec<GateId>,
    /// The signal the stage drives.
    pub output: SignalId,
}

/// A chain placed into a netlist.
#[derive(Clone, Debug)]
pub struct GateChain {
    name: String,
    kind: StageKind,
    inputs: Vec<SignalId>,
    output: SignalId,
    internal: Vec<SignalId>,
    stages: Vec<Stage>,
}

impl GateChain {
    /// Builds an `n`-input parity chain with fresh ports.
    pub fn xor(netlist: &mut Netlist, name: &str, n: usize) -> Result<Self, SimError> {
        ChainSpec::new(name, StageKind::Xor, n)?.build(netlist)
    }

    /// Builds an `n`-input cascade of single NANDs with fresh ports.
    pub fn nand(netlist: &mut Netlist, name: &str, n: usize) -> Result<Self, SimError> {
        ChainSpec::new(name, StageKind::Nand, n)?.build(netlist)
    }

    /// Chain name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stage kind.
    pub fn kind(&self) -> StageKind {
        self.kind
    }

    /// External inputs, in order.
    pub fn inputs(&self) -> &[SignalId] {
        &self.inputs
    }

    /// External output.
    pub fn output(&self) -> SignalId {
        self.output
    }

    /// Signals between consecutive stages (`n - 2` of them).
    pub fn internal_signals(&self) -> &[SignalId] {
        &self.internal
    }

    /// Stages in chain order.
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Total NAND gates placed.
    pub fn gate_count(&self) -> usize {
        self.stages.iter().map(|s| s.gates.len()).sum()
    }

    /// Upper bound on the delta cycles needed to settle after one input change.
    pub fn max_settle_deltas(&self) -> usize {
        self.stages.len() * self.kind.stage_depth()
    }

    /// Expected settled output for an input vector.
    pub fn expected(&self, inputs: &[bool]) -> bool {
        self.kind.fold(inputs)
    }
}

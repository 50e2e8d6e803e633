//! Chromosome descriptor: structural metadata and the generated device layout.

use super::Gene;

/// Device-side constant holding the number of genes per chromosome.
pub const GENE_SIZE_CONSTANT: &str = "SHUFFLER_CHROMOSOME_GENE_SIZE";

/// Device-side aggregate type holding one chromosome.
pub const AGGREGATE_TYPE: &str = "ShufflerChromosome";

/// Errors raised while describing a chromosome.
#[derive(Debug, thiserror::Error)]
pub enum ChromosomeError {
    #[error("Invalid chromosome definition: {0}")]
    InvalidChromosomeDefinition(String),
}

/// Text artifacts describing the flattened population layout to the device compiler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceLayout {
    /// Declarations contributed by the gene type.
    pub gene_declarations: String,
    /// Symbolic gene-count constant.
    pub size_constant: String,
    /// Fixed-size aggregate with a single `genes` array field.
    pub aggregate_type: String,
}

impl DeviceLayout {
    /// Combined source fragment: gene declarations, size constant, aggregate type.
    pub fn source(&self) -> String {
        format!(
            "{}\n{}\n{}\n",
            self.gene_declarations, self.size_constant, self.aggregate_type
        )
    }
}

/// An ordered, fixed-length list of genes.
///
/// A shuffler chromosome is homogeneous: every position shares one value
/// domain, one uniqueness rule and one device declaration.
#[derive(Debug)]
pub struct ChromosomeDescriptor {
    name: String,
    genes: Vec<Box<dyn Gene>>,
}

impl ChromosomeDescriptor {
    /// Build a descriptor, validating the gene list.
    pub fn new(genes: Vec<Box<dyn Gene>>, name: impl Into<String>) -> Result<Self, ChromosomeError> {
        let invalid = |reason: String| -> Result<Self, ChromosomeError> {
            Err(ChromosomeError::InvalidChromosomeDefinition(reason))
        };

        let Some(first) = genes.first() else {
            return invalid("gene list is empty".into());
        };
        if first.domain().is_empty() {
            return invalid("gene 0 has an empty value domain".into());
        }
        if i32::try_from(genes.len()).is_err() {
            return invalid(format!("{} genes exceed the device index range", genes.len()));
        }

        let declarations = first.declarations();
        for (i, gene) in genes.iter().enumerate().skip(1) {
            if gene.domain() != first.domain() {
                return invalid(format!("gene {i} has a different value domain than gene 0"));
            }
            if gene.is_unique() != first.is_unique() {
                return invalid(format!("gene {i} disagrees with gene 0 on value uniqueness"));
            }
            if gene.declarations() != declarations {
                return invalid(format!("gene {i} contributes different device declarations"));
            }
        }

        if first.is_unique() {
            let domain = first.domain();
            if domain.len() < genes.len() {
                return invalid(format!(
                    "permutation of {} genes needs at least as many domain values, got {}",
                    genes.len(),
                    domain.len()
                ));
            }
            let mut sorted = domain.to_vec();
            sorted.sort_unstable();
            if sorted.windows(2).any(|w| w[0] == w[1]) {
                return invalid("permutation domain contains duplicate values".into());
            }
        }

        Ok(Self {
            name: name.into(),
            genes,
        })
    }

    /// Chromosome name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of genes per chromosome.
    #[inline]
    pub fn gene_count(&self) -> usize {
        self.genes.len()
    }

    /// Length of one flattened chromosome; one entry per gene.
    #[inline]
    pub fn dna_total_length(&self) -> usize {
        self.gene_count()
    }

    /// Gene at `position`.
    #[inline]
    pub fn gene(&self, position: usize) -> &dyn Gene {
        self.genes[position].as_ref()
    }

    /// All genes in order.
    pub fn genes(&self) -> impl Iterator<Item = &dyn Gene> {
        self.genes.iter().map(|g| g.as_ref())
    }

    /// Shared value domain of every gene.
    pub fn domain(&self) -> &[i32] {
        self.genes[0].domain()
    }

    /// Whether chromosomes must stay permutations (no repeated values).
    pub fn is_permutation(&self) -> bool {
        self.genes[0].is_unique()
    }

    /// Check that `dna` is a legal chromosome under this descriptor.
    pub fn is_valid_dna(&self, dna: &[i32]) -> bool {
        if dna.len() != self.gene_count() || !dna.iter().all(|v| self.domain().contains(v)) {
            return false;
        }
        if self.is_permutation() {
            let mut sorted = dna.to_vec();
            sorted.sort_unstable();
            return sorted.windows(2).all(|w| w[0] != w[1]);
        }
        true
    }

    /// Generate the device-side declarations for this chromosome.
    pub fn build_device_layout(&self) -> DeviceLayout {
        let count = self.gene_count();
        DeviceLayout {
            gene_declarations: self.genes[0].declarations(),
            size_constant: format!("const {GENE_SIZE_CONSTANT}: u32 = {count}u;"),
            aggregate_type: format!("struct {AGGREGATE_TYPE} {{\n    genes: array<i32, {count}>,\n}}"),
        }
    }
}

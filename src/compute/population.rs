//! Population storage: chromosomes flattened row-major into one buffer.

use super::{PipelineError, check_len};

/// A single candidate solution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chromosome {
    dna: Vec<i32>,
}

impl Chromosome {
    /// Wrap an explicit gene sequence.
    pub fn from_dna(dna: Vec<i32>) -> Self {
        Self { dna }
    }

    /// Number of genes.
    #[inline]
    pub fn gene_count(&self) -> usize {
        self.dna.len()
    }

    /// Gene values in order.
    pub fn dna(&self) -> &[i32] {
        &self.dna
    }

    /// Replace every gene. The length may not change.
    pub fn set_dna(&mut self, dna: &[i32]) -> Result<(), PipelineError> {
        check_len("chromosome dna", self.dna.len(), dna.len())?;
        self.dna.copy_from_slice(dna);
        Ok(())
    }
}

/// All chromosomes of one generation, stored as
/// `dna[individual * gene_count + gene]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Population {
    dna: Vec<i32>,
    gene_count: usize,
}

impl Population {
    /// Wrap a flattened buffer. Its length must be a non-zero multiple of `gene_count`.
    pub fn from_flat(dna: Vec<i32>, gene_count: usize) -> Result<Self, PipelineError> {
        if gene_count == 0 || dna.is_empty() || dna.len() % gene_count != 0 {
            // Smallest whole number of rows that would hold the buffer.
            let row = gene_count.max(1);
            return Err(PipelineError::DimensionMismatch {
                what: "flattened population",
                expected: dna.len().div_ceil(row).max(1) * row,
                actual: dna.len(),
            });
        }
        Ok(Self { dna, gene_count })
    }

    /// Build from chromosomes that all share one gene count.
    pub fn from_chromosomes(chromosomes: &[Chromosome]) -> Result<Self, PipelineError> {
        let gene_count = chromosomes.first().map_or(0, Chromosome::gene_count);
        let mut dna = Vec::with_capacity(chromosomes.len() * gene_count);
        for chromosome in chromosomes {
            check_len("chromosome dna", gene_count, chromosome.gene_count())?;
            dna.extend_from_slice(chromosome.dna());
        }
        Self::from_flat(dna, gene_count)
    }

    /// Number of individuals.
    #[inline]
    pub fn population_size(&self) -> usize {
        self.dna.len() / self.gene_count
    }

    /// Genes per individual.
    #[inline]
    pub fn gene_count(&self) -> usize {
        self.gene_count
    }

    /// Flattened buffer.
    pub fn dna(&self) -> &[i32] {
        &self.dna
    }

    pub(crate) fn dna_mut(&mut self) -> &mut [i32] {
        &mut self.dna
    }

    /// Genes of individual `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= population_size()`.
    #[inline]
    pub fn row(&self, index: usize) -> &[i32] {
        let start = index * self.gene_count;
        &self.dna[start..start + self.gene_count]
    }

    /// Copy of individual `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= population_size()`.
    pub fn chromosome(&self, index: usize) -> Chromosome {
        Chromosome::from_dna(self.row(index).to_vec())
    }

    /// Overwrite individual `index`.
    pub fn set_chromosome(&mut self, index: usize, dna: &[i32]) -> Result<(), PipelineError> {
        if index >= self.population_size() {
            return Err(PipelineError::IndexOutOfRange {
                index,
                population_size: self.population_size(),
            });
        }
        check_len("chromosome dna", self.gene_count, dna.len())?;
        let start = index * self.gene_count;
        self.dna[start..start + self.gene_count].copy_from_slice(dna);
        Ok(())
    }

    /// Iterate over rows.
    pub fn rows(&self) -> impl Iterator<Item = &[i32]> {
        self.dna.chunks_exact(self.gene_count)
    }

    /// Fail unless the population matches the configured dimensions.
    pub(crate) fn check_dimensions(
        &self,
        population_size: usize,
        gene_count: usize,
    ) -> Result<(), PipelineError> {
        check_len("population gene count", gene_count, self.gene_count)?;
        check_len("population", population_size, self.population_size())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_flat_requires_whole_rows() {
        assert!(Population::from_flat(vec![1, 2, 3, 4], 3).is_err());
        assert!(Population::from_flat(Vec::new(), 3).is_err());
        assert!(Population::from_flat(vec![1, 2], 0).is_err());

        let population = Population::from_flat(vec![1, 2, 3, 3, 2, 1], 3).unwrap();
        assert_eq!(population.population_size(), 2);
        assert_eq!(population.gene_count(), 3);
        assert_eq!(population.row(1), &[3, 2, 1]);
    }

    #[test]
    fn test_from_chromosomes() {
        let population = Population::from_chromosomes(&[
            Chromosome::from_dna(vec![0, 1]),
            Chromosome::from_dna(vec![1, 0]),
        ])
        .unwrap();
        assert_eq!(population.dna(), &[0, 1, 1, 0]);
        assert_eq!(population.chromosome(1).dna(), &[1, 0]);
        assert_eq!(population.rows().count(), 2);

        let ragged = Population::from_chromosomes(&[
            Chromosome::from_dna(vec![0, 1]),
            Chromosome::from_dna(vec![0]),
        ]);
        assert!(matches!(
            ragged,
            Err(PipelineError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_set_dna_keeps_length() {
        let mut chromosome = Chromosome::from_dna(vec![1, 2, 3]);
        chromosome.set_dna(&[3, 2, 1]).unwrap();
        assert_eq!(chromosome.dna(), &[3, 2, 1]);
        assert!(chromosome.set_dna(&[1, 2]).is_err());
    }

    #[test]
    fn test_set_chromosome() {
        let mut population = Population::from_flat(vec![0; 6], 3).unwrap();
        population.set_chromosome(1, &[7, 8, 9]).unwrap();
        assert_eq!(population.dna(), &[0, 0, 0, 7, 8, 9]);
        assert!(population.set_chromosome(0, &[1]).is_err());

        assert!(matches!(
            population.set_chromosome(2, &[1, 2, 3]),
            Err(PipelineError::IndexOutOfRange {
                index: 2,
                population_size: 2,
            })
        ));
        assert_eq!(population.dna(), &[0, 0, 0, 7, 8, 9]);
    }

    #[test]
    fn test_check_dimensions() {
        let population = Population::from_flat(vec![0; 6], 3).unwrap();
        assert!(population.check_dimensions(2, 3).is_ok());
        assert!(population.check_dimensions(3, 3).is_err());
        assert!(population.check_dimensions(2, 2).is_err());
    }
}

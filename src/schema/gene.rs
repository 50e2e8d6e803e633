//! Gene capability and the stock [`SimpleGene`] implementation.

use std::fmt;

/// Name of the device-side mutation function every gene declaration must define.
///
/// Signature: `fn gene_mutate(current: i32, draw: f32) -> i32`.
pub const GENE_MUTATE_FN: &str = "gene_mutate";

/// One chromosome position with its own value domain and mutation rule.
pub trait Gene: fmt::Debug + Send + Sync {
    /// Legal values for this position.
    fn domain(&self) -> &[i32];

    /// Whether a chromosome may hold each domain value at most once.
    fn is_unique(&self) -> bool;

    /// WGSL declarations this gene contributes to the device program.
    ///
    /// Must define [`GENE_MUTATE_FN`] with the same behavior as [`Gene::mutate`].
    fn declarations(&self) -> String;

    /// Replacement value for `current`, given a uniform draw in `[0, 1)`.
    fn mutate(&self, current: i32, draw: f32) -> i32;
}

/// A gene drawing from a fixed list of candidate elements.
///
/// Mutation replaces the value with a uniformly chosen element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimpleGene {
    elements: Vec<i32>,
    unique: bool,
}

impl SimpleGene {
    /// Gene whose values may repeat across a chromosome.
    pub fn new(elements: Vec<i32>) -> Self {
        Self {
            elements,
            unique: false,
        }
    }

    /// Gene for permutation chromosomes: every element appears at most once.
    pub fn permutation(elements: Vec<i32>) -> Self {
        Self {
            elements,
            unique: true,
        }
    }

    /// Candidate elements.
    pub fn elements(&self) -> &[i32] {
        &self.elements
    }
}

impl Gene for SimpleGene {
    fn domain(&self) -> &[i32] {
        &self.elements
    }

    fn is_unique(&self) -> bool {
        self.unique
    }

    fn declarations(&self) -> String {
        let count = self.elements.len();
        let values = self
            .elements
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join(", ");

        format!(
            "const SIMPLE_GENE_ELEMENT_COUNT: u32 = {count}u;\n\
             const SIMPLE_GENE_ELEMENTS = array<i32, {count}>({values});\n\
             fn {GENE_MUTATE_FN}(current: i32, draw: f32) -> i32 {{\n\
             \x20   var elements = SIMPLE_GENE_ELEMENTS;\n\
             \x20   let idx = min(u32(draw * f32(SIMPLE_GENE_ELEMENT_COUNT)), SIMPLE_GENE_ELEMENT_COUNT - 1u);\n\
             \x20   return elements[idx];\n\
             }}\n"
        )
    }

    fn mutate(&self, _current: i32, draw: f32) -> i32 {
        let count = self.elements.len();
        let idx = ((draw * count as f32) as usize).min(count.saturating_sub(1));
        self.elements[idx]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mutate_stays_in_domain() {
        let gene = SimpleGene::permutation(vec![3, 5, 7, 11]);
        for step in 0..100 {
            let draw = step as f32 / 100.0;
            assert!(gene.domain().contains(&gene.mutate(3, draw)));
        }
        // Draws at the top of the range clamp to the last element.
        assert_eq!(gene.mutate(3, 0.999_999), 11);
        assert_eq!(gene.mutate(3, 0.0), 3);
    }

    #[test]
    fn test_uniqueness_flag() {
        assert!(SimpleGene::permutation(vec![0, 1]).is_unique());
        assert!(!SimpleGene::new(vec![0, 1]).is_unique());
    }

    #[test]
    fn test_declarations_define_mutation_function() {
        let text = SimpleGene::new(vec![-1, 0, 4]).declarations();
        assert!(text.contains("fn gene_mutate(current: i32, draw: f32) -> i32"));
        assert!(text.contains("array<i32, 3>(-1, 0, 4)"));
        assert!(text.contains("SIMPLE_GENE_ELEMENT_COUNT: u32 = 3u"));
    }
}

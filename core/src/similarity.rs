/// BM25 k1 parameter - controls term frequency saturation.
pub const BM25_K1: f32 = 1.2;

/// BM25 b parameter - controls length normalization.
pub const BM25_B: f32 = 0.75;

/// Scoring function applied by a single `search` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Similarity {
    Bm25,
    /// Classic vector-space TF-IDF.
    Classic,
}

/// Corpus-side inputs for scoring one term or phrase in one field.
#[derive(Debug, Clone, Copy)]
pub struct CollectionStats {
    pub num_docs: u64,
    pub avg_field_length: f32,
}

impl Similarity {
    pub fn idf(&self, doc_freq: u64, stats: &CollectionStats) -> f32 {
        let n = stats.num_docs as f32;
        let df = doc_freq as f32;
        match self {
            Similarity::Bm25 => (1.0 + (n - df + 0.5) / (df + 0.5)).ln(),
            Similarity::Classic => 1.0 + (n / (df + 1.0)).ln(),
        }
    }

    /// Score `freq` occurrences in a field of `field_length` tokens, given the summed idf.
    pub fn score(&self, freq: f32, idf: f32, field_length: u32, stats: &CollectionStats) -> f32 {
        if freq <= 0.0 {
            return 0.0;
        }
        let len = field_length as f32;
        match self {
            Similarity::Bm25 => {
                let length_norm = 1.0 - BM25_B + BM25_B * (len / stats.avg_field_length.max(1.0));
                idf * (freq * (BM25_K1 + 1.0)) / (freq + BM25_K1 * length_norm)
            }
            Similarity::Classic => {
                let norm = if field_length == 0 { 1.0 } else { 1.0 / len.sqrt() };
                freq.sqrt() * idf * idf * norm
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STATS: CollectionStats = CollectionStats { num_docs: 10, avg_field_length: 5.0 };

    #[test]
    fn rarer_terms_weigh_more() {
        for sim in [Similarity::Bm25, Similarity::Classic] {
            assert!(sim.idf(1, &STATS) > sim.idf(5, &STATS));
        }
    }

    #[test]
    fn bm25_saturates_in_frequency() {
        let idf = Similarity::Bm25.idf(2, &STATS);
        let one = Similarity::Bm25.score(1.0, idf, 5, &STATS);
        let two = Similarity::Bm25.score(2.0, idf, 5, &STATS);
        let many = Similarity::Bm25.score(50.0, idf, 5, &STATS);
        assert!(two > one);
        assert!(many < idf * (BM25_K1 + 1.0));
    }

    #[test]
    fn classic_penalizes_long_fields() {
        let idf = Similarity::Classic.idf(2, &STATS);
        assert!(Similarity::Classic.score(1.0, idf, 4, &STATS) > Similarity::Classic.score(1.0, idf, 16, &STATS));
        assert_eq!(Similarity::Classic.score(0.0, idf, 4, &STATS), 0.0);
    }
}

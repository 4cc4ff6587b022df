//! Weighted reciprocal rank fusion.
//!
//! A document at 0-based rank `r` contributes `w / (k + r + 1)` from the
//! vector list and `lexical_boost * w / (k + r + 1)` from the lexical list.

use std::collections::HashMap;

use lawdb_core::config::{FusionSettings, WeightPair};
use lawdb_core::types::{DocId, SearchHit, SourceKind};

use crate::classify::QueryClass;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FusionWeights {
    pub vector: f32,
    pub lexical: f32,
}

impl FusionWeights {
    /// Scale so the pair sums to 1.
    pub fn normalized(self) -> Self {
        let total = self.vector + self.lexical;
        if total > 0.0 { Self { vector: self.vector / total, lexical: self.lexical / total } } else { self }
    }
}

impl From<WeightPair> for FusionWeights {
    fn from(pair: WeightPair) -> Self { Self { vector: pair.vector, lexical: pair.lexical } }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FusedHit {
    pub id: DocId,
    pub score: f32,
    pub source: SourceKind,
    pub vector_score: Option<f32>,
    pub lexical_score: Option<f32>,
}

#[derive(Debug, Clone)]
pub struct RankFusion {
    settings: FusionSettings,
}

impl Default for RankFusion {
    fn default() -> Self { Self::new(FusionSettings::default()) }
}

impl RankFusion {
    pub fn new(settings: FusionSettings) -> Self { Self { settings } }

    pub fn weights_for(&self, class: QueryClass) -> FusionWeights {
        let pair = match class {
            QueryClass::Exact => self.settings.exact,
            QueryClass::Semantic => self.settings.semantic,
            QueryClass::Mixed => self.settings.mixed,
        };
        FusionWeights::from(pair).normalized()
    }

    /// Merge both lists by corpus position. Equal fused scores keep the order
    /// in which documents were first seen (vector list, then lexical list).
    pub fn fuse(&self, vector: &[SearchHit], lexical: &[SearchHit], class: QueryClass, limit: usize) -> Vec<FusedHit> {
        let weights = self.weights_for(class);
        let k = self.settings.k;
        let lexical_weight = self.settings.lexical_boost * weights.lexical;

        let mut fused: Vec<FusedHit> = Vec::with_capacity(vector.len() + lexical.len());
        let mut slot: HashMap<DocId, usize> = HashMap::new();

        for (rank, hit) in vector.iter().enumerate() {
            if slot.contains_key(&hit.id) { continue; }
            slot.insert(hit.id, fused.len());
            fused.push(FusedHit {
                id: hit.id,
                score: weights.vector / (k + rank as f32 + 1.0),
                source: SourceKind::Vector,
                vector_score: Some(hit.score),
                lexical_score: None,
            });
        }
        for (rank, hit) in lexical.iter().enumerate() {
            let contribution = lexical_weight / (k + rank as f32 + 1.0);
            match slot.get(&hit.id) {
                Some(&i) if fused[i].lexical_score.is_some() => {}
                Some(&i) => {
                    let entry = &mut fused[i];
                    entry.score += contribution;
                    entry.source = SourceKind::Hybrid;
                    entry.lexical_score = Some(hit.score);
                }
                None => {
                    slot.insert(hit.id, fused.len());
                    fused.push(FusedHit {
                        id: hit.id,
                        score: contribution,
                        source: SourceKind::Lexical,
                        vector_score: None,
                        lexical_score: Some(hit.score),
                    });
                }
            }
        }

        // stable: ties stay in first-seen order
        fused.sort_by(|a, b| b.score.total_cmp(&a.score));
        fused.truncate(limit);
        tracing::debug!(?class, vector = vector.len(), lexical = lexical.len(), fused = fused.len(), "fused candidates");
        fused
    }
}

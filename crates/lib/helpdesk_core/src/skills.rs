//! Technician skill matching.
//!
//! Skill labels are compared case-insensitively. A technician's score is the
//! number of needed skills they have; candidates with no overlap are dropped
//! and the rest are ranked by descending score.

use std::collections::HashSet;

use serde::Serialize;
use tracing::debug;

use crate::models::auth::Identity;

/// Parse a stored skill list (a JSON array of strings).
pub fn parse_skills(raw: &str) -> Result<Vec<String>, serde_json::Error> {
    serde_json::from_str(raw)
}

/// Serialize a skill list for storage.
pub fn encode_skills(skills: &[String]) -> String {
    // Serializing a slice of strings cannot fail.
    serde_json::to_string(skills).unwrap_or_else(|_| "[]".to_string())
}

/// Number of entries in `needed` present in `tech_skills`, ignoring case.
pub fn match_score(tech_skills: &[String], needed: &[String]) -> usize {
    let have: HashSet<String> = tech_skills.iter().map(|s| s.to_lowercase()).collect();
    needed
        .iter()
        .filter(|need| have.contains(&need.to_lowercase()))
        .count()
}

/// A technician with a positive match score.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredTechnician {
    pub id: i64,
    pub email: String,
    pub skills: Vec<String>,
    pub score: usize,
}

/// Rank technicians against `needed`.
///
/// Zero-score technicians are excluded. Equal scores keep their input order,
/// so callers that pass technicians ordered by id get a deterministic
/// ranking. A technician whose stored skills cannot be parsed is skipped.
pub fn rank_technicians(techs: &[Identity], needed: &[String]) -> Vec<ScoredTechnician> {
    let mut ranked: Vec<ScoredTechnician> = techs
        .iter()
        .filter_map(|tech| {
            let skills = match tech.skills.as_deref() {
                None => Vec::new(),
                Some(raw) => match parse_skills(raw) {
                    Ok(skills) => skills,
                    Err(e) => {
                        debug!(tech_id = tech.id, error = %e, "skipping technician with unparseable skills");
                        return None;
                    }
                },
            };
            let score = match_score(&skills, needed);
            (score > 0).then(|| ScoredTechnician {
                id: tech.id,
                email: tech.email.clone(),
                skills,
                score,
            })
        })
        .collect();

    // Stable: ties keep input order.
    ranked.sort_by(|a, b| b.score.cmp(&a.score));
    ranked
}

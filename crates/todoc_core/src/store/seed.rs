//! Fixed project list written when a store is first created.

use crate::model::project::Project;

/// Projects every new store starts with.
pub fn default_projects() -> [Project; 3] {
    [
        Project::new(1, "Projet Tartampion", 0xFFEA_DAD1),
        Project::new(2, "Projet Lucidia", 0xFFB4_CDBA),
        Project::new(3, "Projet Circus", 0xFFA3_CED2),
    ]
}

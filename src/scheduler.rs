//! Scheduler Module
//!
//! Teacher to course assignment as a maximum bipartite matching, found with
//! Kuhn's augmenting-path search. All search state is allocated per call.

use std::collections::{BTreeMap, HashMap};

/// Assigns each teacher at most one course they are qualified for, and each
/// course at most one teacher, maximizing the number of assignments.
///
/// Teachers left without an augmenting path are absent from the result.
/// Among maximum matchings the one returned depends on iteration order, which
/// is the sorted order of teachers and then each teacher's listed courses.
pub fn schedule(qualifications: &BTreeMap<String, Vec<String>>) -> BTreeMap<String, String> {
    let teachers: Vec<&str> = qualifications.keys().map(String::as_str).collect();

    let mut courses: Vec<&str> = Vec::new();
    let mut course_index: HashMap<&str, usize> = HashMap::new();
    let mut adjacency: Vec<Vec<usize>> = Vec::with_capacity(teachers.len());

    for qualified in qualifications.values() {
        let mut edges = Vec::with_capacity(qualified.len());
        for course in qualified {
            let index = *course_index.entry(course.as_str()).or_insert_with(|| {
                courses.push(course.as_str());
                courses.len() - 1
            });
            if !edges.contains(&index) {
                edges.push(index);
            }
        }
        adjacency.push(edges);
    }

    let mut matching = Matching {
        adjacency: &adjacency,
        course_owner: vec![None; courses.len()],
        visited: vec![false; courses.len()],
    };
    for teacher in 0..teachers.len() {
        matching.visited.iter_mut().for_each(|v| *v = false);
        matching.augment(teacher);
    }

    matching
        .course_owner
        .iter()
        .enumerate()
        .filter_map(|(course, owner)| {
            owner.map(|teacher| (teachers[teacher].to_string(), courses[course].to_string()))
        })
        .collect()
}

struct Matching<'a> {
    adjacency: &'a [Vec<usize>],
    course_owner: Vec<Option<usize>>,
    visited: Vec<bool>,
}

impl Matching<'_> {
    /// Depth-first search for an augmenting path starting at `teacher`.
    fn augment(&mut self, teacher: usize) -> bool {
        let adjacency = self.adjacency;
        for &course in &adjacency[teacher] {
            if self.visited[course] {
                continue;
            }
            self.visited[course] = true;
            let free = match self.course_owner[course] {
                None => true,
                Some(owner) => self.augment(owner),
            };
            if free {
                self.course_owner[course] = Some(teacher);
                return true;
            }
        }
        false
    }
}

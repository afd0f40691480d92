//! Statistics reported when the accumulator is drained at batch end (§4.7).

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct BatchStats {
    pub total_paths: usize,
    pub total_files: usize,
    pub paths_with_multiple_files: usize,
    pub largest_path: Option<(String, usize)>,
}

impl BatchStats {
    pub fn from_path_file_counts(counts: &std::collections::HashMap<String, usize>) -> Self {
        let total_paths = counts.len();
        let total_files = counts.values().sum();
        let paths_with_multiple_files = counts.values().filter(|&&n| n > 1).count();
        let largest_path = counts
            .iter()
            .max_by_key(|(_, &n)| n)
            .map(|(path, &n)| (path.clone(), n));

        BatchStats {
            total_paths,
            total_files,
            paths_with_multiple_files,
            largest_path,
        }
    }
}

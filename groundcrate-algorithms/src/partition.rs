//! Splitting a cloud into ground and obstacle subsets

use groundcrate_core::{Error, PointCloud3f, Result};
use tracing::info;

/// Sorted, de-duplicated indices of the points classified as ground
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroundIndices {
    indices: Vec<usize>,
}

impl GroundIndices {
    pub fn new(mut indices: Vec<usize>) -> Self {
        indices.sort_unstable();
        indices.dedup();
        Self { indices }
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn contains(&self, index: usize) -> bool {
        self.indices.binary_search(&index).is_ok()
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.indices
    }
}

impl FromIterator<usize> for GroundIndices {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// The two disjoint subsets of a classified cloud
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Partition {
    pub ground: PointCloud3f,
    pub obstacle: PointCloud3f,
}

/// Split `cloud` into the points listed in `ground` and all the others.
///
/// Both outputs keep the relative order of `cloud`. Either may be empty.
/// An index outside the cloud is rejected.
pub fn partition_by_indices(cloud: &PointCloud3f, ground: &GroundIndices) -> Result<Partition> {
    if let Some(&last) = ground.as_slice().last() {
        if last >= cloud.len() {
            return Err(Error::InvalidData(format!(
                "ground index {} out of range for a cloud of {} points",
                last,
                cloud.len()
            )));
        }
    }

    let mut is_ground = vec![false; cloud.len()];
    for &idx in ground.as_slice() {
        is_ground[idx] = true;
    }

    let mut partition = Partition {
        ground: PointCloud3f::with_capacity(ground.len()),
        obstacle: PointCloud3f::with_capacity(cloud.len() - ground.len()),
    };

    for (point, &keep) in cloud.iter().zip(&is_ground) {
        if keep {
            partition.ground.push(*point);
        } else {
            partition.obstacle.push(*point);
        }
    }

    info!(
        ground = partition.ground.len(),
        obstacle = partition.obstacle.len(),
        "cloud partitioned"
    );

    Ok(partition)
}

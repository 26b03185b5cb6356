use derive_more::Display;
use itertools::iproduct;
use thiserror::Error;

/// Extents along the three hardware axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[display("({x}, {y}, {z})")]
pub struct Dim3 {
    pub x: usize,
    pub y: usize,
    pub z: usize,
}

impl Default for Dim3 {
    #[inline]
    fn default() -> Self {
        Self::ONE
    }
}

impl Dim3 {
    pub const ONE: Self = Self::new(1, 1, 1);
    pub const ZERO: Self = Self::new(0, 0, 0);

    #[inline]
    pub const fn new(x: usize, y: usize, z: usize) -> Self {
        Self { x, y, z }
    }

    #[inline]
    pub const fn get(&self, axis: usize) -> usize {
        match axis {
            0 => self.x,
            1 => self.y,
            _ => self.z,
        }
    }

    #[inline]
    pub fn get_mut(&mut self, axis: usize) -> &mut usize {
        match axis {
            0 => &mut self.x,
            1 => &mut self.y,
            _ => &mut self.z,
        }
    }

    #[inline]
    pub const fn size(&self) -> usize {
        self.x * self.y * self.z
    }

    /// Iterates all coordinates inside the extents, `x` fastest.
    pub fn iter(self) -> impl Iterator<Item = Dim3> {
        iproduct!(0..self.z, 0..self.y, 0..self.x).map(|(z, y, x)| Dim3::new(x, y, z))
    }

    /// Linear position of `coord` inside the extents, `x` fastest.
    #[inline]
    pub const fn linear(&self, coord: Dim3) -> usize {
        (coord.z * self.y + coord.y) * self.x + coord.x
    }
}

const AXES: [char; 3] = ['x', 'y', 'z'];

#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("direct mapping needs {required} groups along {axis}, but at most {max} are available")]
    TooManyGroups {
        axis: char,
        required: usize,
        max: usize,
    },
    #[error("direct mapping needs {required} lanes along {axis}, but at most {max} are available")]
    TooManyLanesAxis {
        axis: char,
        required: usize,
        max: usize,
    },
    #[error("direct mapping needs {required} lanes per group, but at most {max} are available")]
    TooManyLanes { required: usize, max: usize },
}

/// Resources a policy tree asks for before a device launch.
///
/// Direct mappings are hard minimums: every tile or iteration owns one group or lane.
/// Loop mappings are preferences: fewer resources only mean more strides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LaunchRequest {
    pub groups: Dim3,
    pub group_loop: Dim3,
    pub lanes: Dim3,
    pub lane_loop: Dim3,
}

impl Default for LaunchRequest {
    #[inline]
    fn default() -> Self {
        Self {
            groups: Dim3::ONE,
            group_loop: Dim3::ONE,
            lanes: Dim3::ONE,
            lane_loop: Dim3::ONE,
        }
    }
}

#[inline]
fn combine(dim: &mut Dim3, axis: usize, count: usize) {
    let value = dim.get_mut(axis);
    *value = (*value).max(count);
}

impl LaunchRequest {
    #[inline]
    pub fn direct_groups(&mut self, axis: usize, count: usize) {
        combine(&mut self.groups, axis, count);
    }

    #[inline]
    pub fn loop_groups(&mut self, axis: usize, count: usize) {
        combine(&mut self.group_loop, axis, count);
    }

    #[inline]
    pub fn direct_lanes(&mut self, axis: usize, count: usize) {
        combine(&mut self.lanes, axis, count);
    }

    #[inline]
    pub fn loop_lanes(&mut self, axis: usize, count: usize) {
        combine(&mut self.lane_loop, axis, count);
    }

    /// Fits the request into `limits`.
    pub fn resolve(&self, limits: &Limits) -> Result<LaunchDims, LaunchError> {
        let mut groups = Dim3::ONE;
        let mut lanes = Dim3::ONE;

        for axis in 0..3 {
            let (direct, prefer, max) = (
                self.groups.get(axis),
                self.group_loop.get(axis),
                limits.max_groups.get(axis),
            );
            if direct > max {
                return Err(LaunchError::TooManyGroups {
                    axis: AXES[axis],
                    required: direct,
                    max,
                });
            }
            *groups.get_mut(axis) = direct.max(prefer.min(max)).max(1);

            let (direct, prefer, max) = (
                self.lanes.get(axis),
                self.lane_loop.get(axis),
                limits.max_lanes.get(axis),
            );
            if direct > max {
                return Err(LaunchError::TooManyLanesAxis {
                    axis: AXES[axis],
                    required: direct,
                    max,
                });
            }
            *lanes.get_mut(axis) = direct.max(prefer.min(max)).max(1);
        }

        // shrink loop-mapped lane axes until the group fits
        while lanes.size() > limits.max_lanes_total {
            let axis = (0..3)
                .filter(|&axis| lanes.get(axis) > self.lanes.get(axis).max(1))
                .max_by_key(|&axis| lanes.get(axis));
            match axis {
                Some(axis) => {
                    let floor = self.lanes.get(axis).max(1);
                    let value = lanes.get_mut(axis);
                    *value = (*value / 2).max(floor);
                }
                None => {
                    return Err(LaunchError::TooManyLanes {
                        required: lanes.size(),
                        max: limits.max_lanes_total,
                    });
                }
            }
        }

        Ok(LaunchDims { groups, lanes })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[display("groups {groups}, lanes {lanes}")]
pub struct LaunchDims {
    pub groups: Dim3,
    pub lanes: Dim3,
}

/// Hardware limits of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Limits {
    pub max_groups: Dim3,
    pub max_lanes: Dim3,
    pub max_lanes_total: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_groups: Dim3::new(65535, 65535, 65535),
            max_lanes: Dim3::new(256, 256, 64),
            max_lanes_total: 256,
        }
    }
}

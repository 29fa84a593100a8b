//! u32 ids that wrap around when they reach the maximum value

/// Index that wraps around 2^32
macro_rules! wrapping_id {
    ($struct_name:ident) => {
        $crate::_internal::paste! {
        mod [<$struct_name:lower _module>] {
            use serde::{Deserialize, Serialize};
            use core::ops::{Add, AddAssign, Deref, Sub};
            use core::cmp::Ordering;
            use bevy_reflect::Reflect;
            use $crate::wrapping_id::wrapping_diff;

            #[derive(
                Serialize, Deserialize, Clone, Copy, Debug, Eq, Hash, PartialEq, Default, Reflect,
            )]
            pub struct $struct_name(pub u32);

            /// Derive deref so that we don't have to write tick.0 in most cases
            impl Deref for $struct_name {
                type Target = u32;
                fn deref(&self) -> &Self::Target {
                    &self.0
                }
            }

            impl Ord for $struct_name {
                fn cmp(&self, other: &Self) -> Ordering {
                    match wrapping_diff(self.0, other.0) {
                        0 => Ordering::Equal,
                        x if x > 0 => Ordering::Less,
                        _ => Ordering::Greater,
                    }
                }
            }

            impl PartialOrd for $struct_name {
                fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
                    Some(self.cmp(other))
                }
            }

            impl Sub for $struct_name {
                type Output = i32;

                fn sub(self, rhs: Self) -> Self::Output {
                    wrapping_diff(rhs.0, self.0)
                }
            }

            impl Sub<u32> for $struct_name {
                type Output = Self;

                fn sub(self, rhs: u32) -> Self::Output {
                    Self(self.0.wrapping_sub(rhs))
                }
            }

            impl Add<u32> for $struct_name {
                type Output = Self;

                fn add(self, rhs: u32) -> Self::Output {
                    Self(self.0.wrapping_add(rhs))
                }
            }

            impl Add<i32> for $struct_name {
                type Output = Self;

                fn add(self, rhs: i32) -> Self::Output {
                    Self(self.0.wrapping_add_signed(rhs))
                }
            }

            impl AddAssign<u32> for $struct_name {
                fn add_assign(&mut self, rhs: u32) {
                    self.0 = self.0.wrapping_add(rhs);
                }
            }
        }
        pub use [<$struct_name:lower _module>]::$struct_name;
        }
    };
}

pub(crate) use wrapping_id;

/// Retrieves the wrapping difference of b-a.
/// Wraps around 2^31
///
/// # Examples
///
/// ```
/// use tick_smoother_core::wrapping_id::wrapping_diff;
/// assert_eq!(wrapping_diff(1, 2), 1);
/// assert_eq!(wrapping_diff(2, 1), -1);
/// assert_eq!(wrapping_diff(u32::MAX, 0), 1);
/// assert_eq!(wrapping_diff(0, u32::MAX), -1);
/// ```
pub fn wrapping_diff(a: u32, b: u32) -> i32 {
    b.wrapping_sub(a) as i32
}

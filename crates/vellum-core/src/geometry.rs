use std::ops::Mul;

/// Coordinate type of a [`Rect`]. Integer edges saturate instead of
/// overflowing, so a far-off rect still clips to an empty one.
pub trait Scalar: Copy + Default + PartialOrd {
    /// `self + extent`
    fn edge(self, extent: Self) -> Self;
    /// `to - self`
    fn span(self, to: Self) -> Self;
}

macro_rules! int_scalar {
    ($($ty:ty),*) => {$(
        impl Scalar for $ty {
            #[inline]
            fn edge(self, extent: Self) -> Self {
                self.saturating_add(extent)
            }
            #[inline]
            fn span(self, to: Self) -> Self {
                to.saturating_sub(self)
            }
        }
    )*};
}

macro_rules! float_scalar {
    ($($ty:ty),*) => {$(
        impl Scalar for $ty {
            #[inline]
            fn edge(self, extent: Self) -> Self {
                self + extent
            }
            #[inline]
            fn span(self, to: Self) -> Self {
                to - self
            }
        }
    )*};
}

int_scalar!(i32, u32, i64);
float_scalar!(f32, f64);

/// An axis-aligned rectangle given by its top-left corner and size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rect<T> {
    pub x: T,
    pub y: T,
    pub width: T,
    pub height: T,
}

/// Integer rectangle used for scissor rects and viewports.
pub type IRect = Rect<i32>;

/// Floating-point rectangle used by the shape builders.
pub type FRect = Rect<f32>;

impl<T> Rect<T> {
    pub const fn new(x: T, y: T, width: T, height: T) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

impl<T: Scalar> Rect<T> {
    pub fn left(&self) -> T {
        self.x
    }

    pub fn top(&self) -> T {
        self.y
    }

    pub fn right(&self) -> T {
        self.x.edge(self.width)
    }

    pub fn bottom(&self) -> T {
        self.y.edge(self.height)
    }

    pub fn size(&self) -> Size<T> {
        Size::new(self.width, self.height)
    }

    /// Intersection of two rectangles, or an empty rectangle at the origin of
    /// `self` when they do not overlap.
    pub fn intersect(&self, other: &Self) -> Self {
        let max = |a: T, b: T| if a > b { a } else { b };
        let min = |a: T, b: T| if a < b { a } else { b };

        let left = max(self.left(), other.left());
        let top = max(self.top(), other.top());
        let right = min(self.right(), other.right());
        let bottom = min(self.bottom(), other.bottom());

        if right <= left || bottom <= top {
            return Self::new(self.x, self.y, T::default(), T::default());
        }

        Self::new(left, top, left.span(right), top.span(bottom))
    }
}

impl IRect {
    pub fn to_f32(self) -> FRect {
        FRect::new(
            self.x as f32,
            self.y as f32,
            self.width as f32,
            self.height as f32,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Size<T> {
    pub width: T,
    pub height: T,
}

impl<T> Size<T> {
    pub const fn new(width: T, height: T) -> Self {
        Size { width, height }
    }

    pub fn cast<U: From<T>>(self) -> Size<U> {
        Size {
            width: U::from(self.width),
            height: U::from(self.height),
        }
    }
}

impl<T: Mul + Copy> Mul<T> for Size<T> {
    type Output = Size<<T as Mul>::Output>;

    fn mul(self, rhs: T) -> Self::Output {
        Size {
            width: self.width * rhs,
            height: self.height * rhs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_edges() {
        let rect = IRect::new(10, 20, 30, 40);
        assert_eq!(rect.right(), 40);
        assert_eq!(rect.bottom(), 60);
        assert_eq!(rect.size(), Size::new(30, 40));
    }

    #[test]
    fn test_rect_intersect() {
        let a = IRect::new(0, 0, 100, 100);
        let b = IRect::new(50, 60, 100, 100);
        assert_eq!(a.intersect(&b), IRect::new(50, 60, 50, 40));

        let disjoint = IRect::new(200, 200, 10, 10);
        let empty = a.intersect(&disjoint);
        assert_eq!(empty.width, 0);
        assert_eq!(empty.height, 0);
    }

    #[test]
    fn test_far_scissor_clips_to_empty() {
        let target = IRect::new(0, 0, 800, 600);
        let far = IRect::new(i32::MAX - 5, 0, 100, 10);
        assert_eq!(far.right(), i32::MAX);

        let clipped = far.intersect(&target);
        assert_eq!(clipped.width, 0);
        assert_eq!(clipped.height, 0);
    }

    #[test]
    fn test_huge_scissor_clips_to_target() {
        let target = IRect::new(0, 0, 800, 600);
        let huge = IRect::new(i32::MIN, i32::MIN, i32::MAX, i32::MAX);
        assert_eq!(huge.right(), -1);
        assert_eq!(huge.intersect(&target).width, 0);

        let wide = IRect::new(-100, -100, i32::MAX, i32::MAX);
        assert_eq!(wide.intersect(&target), target);
    }

    #[test]
    fn test_float_rect_edges() {
        let rect = FRect::new(1.5, 2.0, 3.0, 4.5);
        assert_eq!(rect.right(), 4.5);
        assert_eq!(rect.bottom(), 6.5);
    }
}

use super::CommandType;

/// Dirty bits, one per [`CommandType`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChangeSet(u64);

impl ChangeSet {
    pub const fn new() -> Self {
        Self(0)
    }

    pub fn set(&mut self, ty: CommandType) {
        self.0 |= 1 << ty.index();
    }

    pub fn clear(&mut self, ty: CommandType) {
        self.0 &= !(1 << ty.index());
    }

    pub fn has(&self, ty: CommandType) -> bool {
        self.0 & (1 << ty.index()) != 0
    }

    pub fn any(&self) -> bool {
        self.0 != 0
    }

    pub fn clear_all(&mut self) {
        self.0 = 0;
    }

    pub fn bits(&self) -> u64 {
        self.0
    }

    /// Dirty types in ascending [`CommandType`] order.
    pub fn iter(&self) -> impl Iterator<Item = CommandType> + use<> {
        let mut bits = self.0;
        std::iter::from_fn(move || {
            if bits == 0 {
                return None;
            }
            let index = bits.trailing_zeros() as usize;
            bits &= bits - 1;
            CommandType::from_index(index)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_clear() {
        let mut changes = ChangeSet::new();
        assert!(!changes.any());
        changes.set(CommandType::PsTexture7);
        changes.set(CommandType::ColorMul);
        assert!(changes.has(CommandType::PsTexture7));
        assert!(!changes.has(CommandType::ColorAdd));
        changes.clear(CommandType::PsTexture7);
        assert!(!changes.has(CommandType::PsTexture7));
        assert!(changes.any());
        changes.clear_all();
        assert_eq!(changes.bits(), 0);
    }

    #[test]
    fn test_iter_is_ordered() {
        let mut changes = ChangeSet::new();
        changes.set(CommandType::Transform);
        changes.set(CommandType::BlendState);
        changes.set(CommandType::VsTexture1);
        let order: Vec<_> = changes.iter().collect();
        assert_eq!(
            order,
            vec![CommandType::BlendState, CommandType::Transform, CommandType::VsTexture1]
        );
    }
}

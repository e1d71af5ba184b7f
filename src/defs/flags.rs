use bitflags::bitflags;

bitflags! {
    /// Behaviour / collision flags carried by every actor.
    ///
    /// Numeric values match `doom/info.h`; only the bits the blockmap
    /// queries look at are listed.
    #[derive(Default, Clone, Copy, Debug, PartialEq, Eq)]
    pub struct MobjFlags: u32 {
        // Blocks movement.
        const SOLID          = 0x0000_0002;
        // Can be hit by bullets/projectiles.
        const SHOOTABLE      = 0x0000_0004;
        // Kept out of the blockmap, still rendered.
        const NOBLOCKMAP     = 0x0000_0010;
        // Passes through walls and other actors.
        const NOCLIP         = 0x0000_1000;
        // Dead body; candidate for resurrection.
        const CORPSE         = 0x0010_0000;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bits_match_vanilla_info_h() {
        assert_eq!(MobjFlags::SOLID.bits(), 0x2);
        assert_eq!(MobjFlags::CORPSE.bits(), 0x10_0000);
        assert_eq!(MobjFlags::all().bits(), 0x0010_1016);
    }
}

use crate::io::{Readable, Version, Writable};
use crate::types::BspResult;
use bytes::{Buf, BufMut};

bitflags! {
    pub struct Contents: u32 {
        const SOLID = 0x1;
        const WINDOW = 0x2;
        const AUX = 0x4;
        const LAVA = 0x8;
        const SLIME = 0x10;
        const WATER = 0x20;
        const MIST = 0x40;

        const AREAPORTAL = 0x8000;
        const PLAYERCLIP = 0x10000;
        const MONSTERCLIP = 0x20000;

        const CURRENT_0 = 0x40000;
        const CURRENT_90 = 0x80000;
        const CURRENT_180 = 0x100000;
        const CURRENT_270 = 0x200000;
        const CURRENT_UP = 0x400000;
        const CURRENT_DOWN = 0x800000;

        const ORIGIN = 0x1000000;
        const MONSTER = 0x2000000;
        const DEADMONSTER = 0x4000000;
        const DETAIL = 0x8000000;
        const TRANSLUCENT = 0x10000000;
        const LADDER = 0x20000000;
    }
}

bitflags! {
    pub struct SurfaceFlags: u32 {
        const LIGHT = 0x1;
        const SLICK = 0x2;
        const SKY = 0x4;
        const WARP = 0x8;
        const TRANS33 = 0x10;
        const TRANS66 = 0x20;
        const FLOWING = 0x40;
        const NODRAW = 0x80;
    }
}

impl Contents {
    /// Contents that produce drawable surfaces and block sight in some way.
    pub fn visible_mask() -> Contents {
        Contents::SOLID
            | Contents::WINDOW
            | Contents::AUX
            | Contents::LAVA
            | Contents::SLIME
            | Contents::WATER
            | Contents::MIST
    }

    pub fn is_solid(&self) -> bool {
        self.contains(Contents::SOLID)
    }

    pub fn is_detail(&self) -> bool {
        self.contains(Contents::DETAIL)
    }

    /// The lowest set visible bit, or empty.
    pub fn lowest_visible(&self) -> Contents {
        let visible = (*self & Contents::visible_mask()).bits();
        Contents::from_bits_truncate(visible & visible.wrapping_neg())
    }
}

impl Default for Contents {
    fn default() -> Self {
        Contents::empty()
    }
}

impl Default for SurfaceFlags {
    fn default() -> Self {
        SurfaceFlags::empty()
    }
}

impl Readable<Contents> for Contents {
    fn read(from: &mut dyn Buf, version: &mut Version) -> BspResult<Self> {
        Ok(Contents::from_bits(u32::read(from, version)?).ok_or_else(|| "Invalid contents")?)
    }
}

impl Writable<Contents> for Contents {
    fn write(&self, to: &mut dyn BufMut, version: &Version) -> BspResult<()> {
        self.bits().write(to, version)
    }
}

impl Readable<SurfaceFlags> for SurfaceFlags {
    fn read(from: &mut dyn Buf, version: &mut Version) -> BspResult<Self> {
        Ok(SurfaceFlags::from_bits(u32::read(from, version)?)
            .ok_or_else(|| "Invalid surface flags")?)
    }
}

impl Writable<SurfaceFlags> for SurfaceFlags {
    fn write(&self, to: &mut dyn BufMut, version: &Version) -> BspResult<()> {
        self.bits().write(to, version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowest_visible_ignores_flags() {
        let c = Contents::WATER | Contents::MIST | Contents::DETAIL;
        assert_eq!(c.lowest_visible(), Contents::WATER);
        assert_eq!(Contents::DETAIL.lowest_visible(), Contents::empty());
        assert!((Contents::SOLID | Contents::DETAIL).is_detail());
    }
}

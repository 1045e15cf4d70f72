use bytemuck::{Pod, Zeroable};

/// Alignment of every [AccelBuffer]
pub const ACCEL_ALIGNMENT: usize = 128;

#[derive(Clone, Copy)]
#[repr(C, align(128))]
struct Block([u8; ACCEL_ALIGNMENT]);

// Safety: a plain byte array, its size is a multiple of its alignment so there is no padding
unsafe impl Zeroable for Block {}
unsafe impl Pod for Block {}

/// Zero initialized byte buffer aligned to [ACCEL_ALIGNMENT]
#[derive(Clone)]
pub struct AccelBuffer {
    blocks: Vec<Block>,
    len: usize,
}

impl AccelBuffer {
    pub fn zeroed(len: usize) -> Self {
        Self {
            blocks: vec![Block::zeroed(); len.div_ceil(ACCEL_ALIGNMENT)],
            len,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_bytes(&self) -> &[u8] {
        &bytemuck::cast_slice(&self.blocks)[..self.len]
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut bytemuck::cast_slice_mut(&mut self.blocks)[..self.len]
    }
}

impl std::fmt::Debug for AccelBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccelBuffer").field("len", &self.len).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::{AccelBuffer, ACCEL_ALIGNMENT};

    #[test]
    fn zeroed_and_aligned() {
        for len in [0, 1, 127, 128, 129, 1000] {
            let buffer = AccelBuffer::zeroed(len);
            assert_eq!(buffer.len(), len);
            assert_eq!(buffer.as_bytes().len(), len);
            assert!(buffer.as_bytes().iter().all(|&b| b == 0));
            assert_eq!(buffer.as_bytes().as_ptr() as usize % ACCEL_ALIGNMENT, 0);
        }
    }

    #[test]
    fn writable() {
        let mut buffer = AccelBuffer::zeroed(200);
        buffer.as_bytes_mut()[199] = 7;
        assert_eq!(buffer.as_bytes()[199], 7);
    }
}

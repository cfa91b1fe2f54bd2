use bytemuck::{Pod, Zeroable};

use crate::cache::TileView;

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct TileLayerUniform {
    pub buffer: u32,
    pub shard: u32,
    pub layer: u32,
    /// 0 draws the blank placeholder.
    pub visible: u32,
}

impl From<&TileView> for TileLayerUniform {
    fn from(view: &TileView) -> Self {
        match view.target {
            Some(target) => Self {
                buffer: target.buffer as u32,
                shard: target.shard as u32,
                layer: target.slot as u32,
                visible: 1,
            },
            None => Self::default(),
        }
    }
}

/// One persistent uniform buffer per tile, allocated once for the largest
/// grid and rewritten in place when a tile's layer changes.
#[derive(Debug)]
pub struct TileLayerBuffers {
    buffers: Vec<wgpu::Buffer>,
    last: Vec<Option<TileLayerUniform>>,
}

impl TileLayerBuffers {
    pub fn new(device: &wgpu::Device, max_tiles: usize) -> Self {
        let buffers = (0..max_tiles)
            .map(|_| {
                device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some("tile-layer"),
                    size: std::mem::size_of::<TileLayerUniform>() as u64,
                    usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                    mapped_at_creation: false,
                })
            })
            .collect();
        Self {
            buffers,
            last: vec![None; max_tiles],
        }
    }

    pub fn capacity(&self) -> usize {
        self.buffers.len()
    }

    /// Write changed tiles; returns how many buffers were touched. Tiles
    /// beyond the allocated capacity are ignored.
    pub fn update(&mut self, queue: &wgpu::Queue, views: &[TileView]) -> usize {
        let mut written = 0;
        for view in views {
            let value = TileLayerUniform::from(view);
            let (Some(buffer), Some(last)) = (self.buffers.get(view.tile), self.last.get_mut(view.tile))
            else {
                continue;
            };
            if *last == Some(value) {
                continue;
            }
            queue.write_buffer(buffer, 0, bytemuck::bytes_of(&value));
            *last = Some(value);
            written += 1;
        }
        written
    }
}

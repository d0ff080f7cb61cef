use std::collections::VecDeque;

/// 平滑化済み座標の固定長リングバッファ
///
/// 容量を超えたら最古の値から捨てる。
#[derive(Debug, Clone)]
pub struct History {
    samples: VecDeque<(f32, f32)>,
    capacity: usize,
}

impl History {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, x: f32, y: f32) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back((x, y));
    }

    pub fn latest(&self) -> Option<(f32, f32)> {
        self.samples.back().copied()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = (f32, f32)> + '_ {
        self.samples.iter().copied()
    }

    /// 軸ごとの母分散。サンプルが2未満なら (0, 0)
    pub fn variance(&self) -> (f32, f32) {
        let n = self.samples.len();
        if n < 2 {
            return (0.0, 0.0);
        }
        let n = n as f32;
        let (sum_x, sum_y) = self
            .samples
            .iter()
            .fold((0.0, 0.0), |(sx, sy), &(x, y)| (sx + x, sy + y));
        let (mean_x, mean_y) = (sum_x / n, sum_y / n);
        let (ss_x, ss_y) = self.samples.iter().fold((0.0, 0.0), |(sx, sy), &(x, y)| {
            (sx + (x - mean_x).powi(2), sy + (y - mean_y).powi(2))
        });
        (ss_x / n, ss_y / n)
    }
}

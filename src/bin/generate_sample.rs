use anyhow::{Context, Result};

const CITIES: [&str; 6] = ["上海", "北京", "广州", "深圳", "杭州", "成都"];
const PRODUCTS: [(&str, f64); 5] = [
    ("笔记本电脑", 5999.0),
    ("显示器", 1299.0),
    ("键盘", 199.0),
    ("鼠标", 89.5),
    ("耳机", 459.0),
];
const NOTES: [&str; 5] = ["", "加急", "客户要求发票, 抬头见邮件", "赠品: \"鼠标垫\"", "已回访"];

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    /// Uniform index in `0..len`.
    fn below(&mut self, len: usize) -> usize {
        (self.next_u64() % len as u64) as usize
    }

    fn pick<'a, T>(&mut self, items: &'a [T]) -> &'a T {
        &items[self.below(items.len())]
    }
}

fn build_csv(rows: usize, rng: &mut SimpleRng) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(["订单编号", "下单日期", "城市", "产品", "单价", "数量", "备注"])?;

    for i in 0..rows {
        let (product, price) = *rng.pick(&PRODUCTS);
        // Every tenth order has no quantity yet.
        let quantity = if i % 10 == 9 {
            String::new()
        } else {
            (1 + rng.below(20)).to_string()
        };
        writer.write_record([
            format!("SO{:05}", i + 1),
            format!("2024-{:02}-{:02}", 1 + rng.below(12), 1 + rng.below(28)),
            rng.pick(&CITIES).to_string(),
            product.to_string(),
            price.to_string(),
            quantity,
            rng.pick(&NOTES).to_string(),
        ])?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| e.into_error())
        .context("flushing CSV writer")?;
    String::from_utf8(bytes).context("CSV output is not UTF-8")
}

fn main() -> Result<()> {
    let mut rng = SimpleRng::new(42);
    let rows = 500;
    let text = build_csv(rows, &mut rng)?;

    let utf8_path = "sample_sales.csv";
    std::fs::write(utf8_path, &text).with_context(|| format!("writing {utf8_path}"))?;

    // Same table as a legacy Excel export would save it on a Chinese Windows.
    let gbk_path = "sample_sales_gbk.csv";
    let (gbk, _, had_errors) = encoding_rs::GBK.encode(&text);
    if had_errors {
        anyhow::bail!("sample text is not representable in GBK");
    }
    std::fs::write(gbk_path, &gbk).with_context(|| format!("writing {gbk_path}"))?;

    println!("Wrote {rows} orders to {utf8_path} (UTF-8) and {gbk_path} (GBK)");
    Ok(())
}

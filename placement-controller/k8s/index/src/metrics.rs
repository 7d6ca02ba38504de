use crate::SharedIndex;
use prometheus_client::{
    collector::Collector,
    encoding::{DescriptorEncoder, EncodeMetric},
    metrics::{gauge::ConstGauge, MetricType},
    registry::Registry,
};

#[derive(Debug)]
struct Instrumented(SharedIndex);

pub fn register(reg: &mut Registry, index: SharedIndex) {
    reg.register_collector(Box::new(Instrumented(index)));
}

impl Collector for Instrumented {
    fn encode(&self, mut encoder: DescriptorEncoder<'_>) -> Result<(), std::fmt::Error> {
        let size = ConstGauge::new(self.0.read().len() as u32);
        let size_encoder = encoder.encode_descriptor(
            "namespace_index_size",
            "The number of namespaces in index",
            None,
            MetricType::Gauge,
        )?;
        size.encode(size_encoder)?;
        Ok(())
    }
}

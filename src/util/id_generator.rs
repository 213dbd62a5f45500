use anyhow::{Result, anyhow};
use rand::Rng;
use snowflake::SnowflakeIdBucket;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

/// Chunk id source shared by every run of a chunker.
#[derive(Clone)]
pub enum IDGenerator {
    Snowflake(Arc<Mutex<SnowflakeIdBucket>>),
    // deterministic ids for tests and reproducible output
    Sequential(Arc<AtomicI64>),
}

impl IDGenerator {
    pub fn generate(&self) -> Result<i64> {
        match self {
            // ids are pooled per bucket (max 4092 per refill)
            IDGenerator::Snowflake(bucket) => bucket
                .lock()
                .map(|mut b| b.get_id())
                .map_err(|e| anyhow!("generate id error: {:?}", e)),
            IDGenerator::Sequential(next) => Ok(next.fetch_add(1, Ordering::Relaxed)),
        }
    }

    /// Id rendered as a decimal string, the form chunks carry.
    pub fn generate_string(&self) -> Result<String> {
        self.generate().map(|id| id.to_string())
    }
}

// bit: smaller than 32
fn random_node(bit: u32) -> u32 {
    let n1: u32 = rand::rng().random();
    let n = ((1 << bit) - 1) & n1;
    tracing::warn!("using random node num for id generator: {}", n);
    n
}

// default 10bit node
pub fn new_generator_by_ip() -> IDGenerator {
    let node = iputil::resolve_host_node(10).unwrap_or_else(|| random_node(10));
    tracing::debug!("using node num for id generator: {}", node);
    // machine_id is the upper 5 bits of the node
    let bucket = SnowflakeIdBucket::new((node >> 5) as i32, node as i32);
    IDGenerator::Snowflake(Arc::new(Mutex::new(bucket)))
}

// node_id: only lower 10bit is valid
pub fn new_generator(node_id: i32) -> IDGenerator {
    let bucket = SnowflakeIdBucket::new(node_id >> 5, node_id);
    IDGenerator::Snowflake(Arc::new(Mutex::new(bucket)))
}

/// Sequential ids starting at `start`.
pub fn new_sequential_generator(start: i64) -> IDGenerator {
    IDGenerator::Sequential(Arc::new(AtomicI64::new(start)))
}

pub mod iputil {
    use pnet::{
        datalink,
        ipnetwork::{IpNetwork, Ipv4Network},
    };
    use std::cmp;
    use std::net::Ipv4Addr;

    #[inline]
    /// `valid_bit`: max bit number for node
    pub fn resolve_host_node(valid_bit: u32) -> Option<u32> {
        resolve_host_ipv4().map(|a| host_node(a, valid_bit))
    }

    pub fn resolve_host_ipv4() -> Option<Ipv4Network> {
        let mut address: Option<Ipv4Network> = None;
        let mut p = 0;
        for iface in datalink::interfaces() {
            for ip in iface.ips {
                match ip {
                    IpNetwork::V4(v4) => {
                        if p < priority(v4.ip()) {
                            address = Some(v4);
                            p = priority(v4.ip());
                        }
                    }
                    IpNetwork::V6(v6) => {
                        tracing::debug!(
                            "ipv6 address {:?} not supported for snowflake node num (use random)",
                            v6
                        );
                    }
                }
            }
        }
        tracing::debug!("priority: {}, ip: {:?}", p, address);
        address
    }

    #[inline]
    pub fn host_node(ip: Ipv4Network, valid_bit: u32) -> u32 {
        let host_mask = cmp::min(
            (0xffff_ffff_u64 >> ip.prefix()) as u32,
            !(0xffff_ffff_u64 << valid_bit) as u32,
        );
        u32::from(ip.ip()) & host_mask
    }

    // loopback < class A < class B < class C private < global
    fn priority(ip: Ipv4Addr) -> usize {
        match ip.octets() {
            [127, ..] => 0,
            [10, ..] => 1,
            [172, b, ..] if (16..32).contains(&b) => 2,
            [192, 168, ..] => 3,
            _ => 4,
        }
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use itertools::Itertools;
    use std::collections::HashSet;

    #[test]
    fn test_sequential_generator() {
        let ids = new_sequential_generator(7);
        assert_eq!(ids.generate().unwrap(), 7);
        assert_eq!(ids.generate_string().unwrap(), "8");
        // clones share the counter
        let cloned = ids.clone();
        assert_eq!(cloned.generate().unwrap(), 9);
        assert_eq!(ids.generate().unwrap(), 10);
    }

    #[tokio::test]
    async fn test_snowflake_thread_safe() {
        use tokio::task::JoinSet;

        let mut set = JoinSet::new();
        let ids = new_generator(1);
        for _ in 0..100 {
            let ids = ids.clone();
            set.spawn(async move { (0..1000).map(|_| ids.generate().unwrap()).collect_vec() });
        }

        let mut seen = HashSet::<i64>::new();
        while let Some(res) = set.join_next().await {
            seen.extend(res.unwrap());
        }
        assert_eq!(seen.len(), 100 * 1000);
    }
}

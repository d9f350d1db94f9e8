use std::error::Error;
use std::fs::File;
use std::io::BufWriter;
use std::thread;

use clap::{Parser, ValueEnum};
use gridghost::grid::UniformGrid;
use gridghost::index_space::range2d;
use gridghost::message::tcp::loopback_peers;
use gridghost::message::{ChannelCommunicator, Controller, TcpCommunicator};
use gridghost::{AmrHierarchy, GhostLayerFilter};
use log::info;

type DynError = Box<dyn Error + Send + Sync>;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Transport {
    Channel,
    Tcp,
}

#[derive(Debug, Parser)]
#[clap(version = "0.1", about = "Extrude and exchange ghost layers on a distributed AMR hierarchy")]
struct Opts {
    #[clap(short = 'r', long, default_value = "4")]
    ranks: usize,

    #[clap(short = 'g', long, default_value = "1")]
    ghost_layers: usize,

    #[clap(short = 'l', long, default_value = "3")]
    levels: usize,

    #[clap(short = 't', long, value_enum, default_value = "channel")]
    transport: Transport,

    #[clap(short = 'p', long, default_value = "7470")]
    port: u16,

    #[clap(short = 's', long)]
    snapshot: Option<String>,
}




/**
 * A 32 x 32 root level in four strips, and on each finer level a 32 x 32
 * region at the center of the domain, in four quadrants. Owners are dealt
 * round-robin; grids are only created for blocks owned by `rank`.
 */
fn hierarchy(levels: usize, ranks: usize, rank: usize) -> AmrHierarchy {
    let mut h = AmrHierarchy::new(2, [0.0; 3], [1.0 / 32.0, 1.0 / 32.0, 1.0]);
    let mut owner = 0;

    for level in 0..levels {
        h.add_level(2);

        let spaces: Vec<_> = if level == 0 {
            (0..4).map(|n| range2d(n * 8..n * 8 + 8, 0..32)).collect()
        } else {
            let c = 16 << level;
            [(c - 16, c - 16), (c, c - 16), (c - 16, c), (c, c)]
                .iter()
                .map(|&(i, j)| range2d(i..i + 16, j..j + 16))
                .collect()
        };
        for space in spaces {
            let meta = h.new_box(level, space, owner % ranks);
            let grid = (meta.owner == rank).then(|| {
                UniformGrid::from_function(&meta, "density", 1, |index| {
                    let [x, y, _] = meta.cell_center(index);
                    vec![1.0 + 0.5 * (6.0 * x).sin() * (4.0 * y).cos()]
                })
            });
            h.push_block(meta, grid);
            owner += 1;
        }
    }
    h
}

fn controllers(opts: &Opts) -> Result<Vec<Controller>, DynError> {
    match opts.transport {
        Transport::Channel => Ok(ChannelCommunicator::group(opts.ranks).into_iter().map(Controller::new).collect()),
        Transport::Tcp => {
            let peers = loopback_peers(opts.port, opts.ranks)?;
            let mut result = Vec::new();

            for rank in 0..opts.ranks {
                result.push(Controller::new(TcpCommunicator::new(rank, peers.clone())?))
            }
            Ok(result)
        }
    }
}

fn run(controller: Controller, levels: usize, ghost_layers: usize, snapshot: Option<String>) -> Result<(), DynError> {
    let rank = controller.rank();
    let input = hierarchy(levels, controller.size(), rank);
    let mut filter = GhostLayerFilter::new()
        .with_ghost_layers(ghost_layers)
        .with_controller(controller);

    let result = filter.execute(&input)?;
    let controller = filter.controller_mut().ok_or("the filter lost its controller")?;
    let global = result.report.global(controller)?;

    if rank == 0 {
        info!("{:?}", global);

        if let Some(path) = snapshot {
            let writer = BufWriter::new(File::create(&path)?);
            ciborium::ser::into_writer(&result.hierarchy, writer)
                .map_err(|e| format!("failed to write {}: {:?}", path, e))?;
            info!("wrote {}", path);
        }
    }
    Ok(())
}




// ============================================================================
fn main() -> Result<(), DynError> {
    simple_logger::init_with_level(log::Level::Info).map_err(|e| e.to_string())?;

    let opts = Opts::parse();
    info!("{:?}", opts);

    if opts.ranks == 0 || opts.levels == 0 {
        return Err("ranks and levels must be positive".into());
    }

    let handles: Vec<_> = controllers(&opts)?
        .into_iter()
        .map(|controller| {
            let (levels, ghost_layers, snapshot) = (opts.levels, opts.ghost_layers, opts.snapshot.clone());
            thread::spawn(move || run(controller, levels, ghost_layers, snapshot))
        })
        .collect();

    for handle in handles {
        handle.join().map_err(|_| "a rank panicked")??;
    }
    Ok(())
}
